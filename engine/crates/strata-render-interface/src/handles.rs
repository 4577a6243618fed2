use slotmap::new_key_type;

new_key_type! {
    /// GfxResourceManager 中 image 的句柄
    pub struct GfxImageHandle;
    /// GfxResourceManager 中 buffer 的句柄
    pub struct GfxBufferHandle;
}
