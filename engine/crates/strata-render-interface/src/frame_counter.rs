pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    /// 同时在 GPU 上执行的最大帧数
    fif_count: u64,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, fif_count: usize) -> Self {
        assert!(fif_count > 0, "frames in flight must be at least 1");
        Self {
            frame_id: init_frame_id,
            fif_count: fif_count as u64,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    pub const DEFAULT_FIF_COUNT: usize = 2;

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn fif_count(&self) -> usize {
        self.fif_count as usize
    }

    /// 提交于 `frame_id` 的 GPU 工作在当前帧是否一定已经结束
    #[inline]
    pub fn is_retired(&self, frame_id: u64) -> bool {
        frame_id + self.fif_count <= self.frame_id
    }

    #[inline]
    pub fn frame_label(&self) -> char {
        (b'A' + (self.frame_id % self.fif_count) as u8) as char
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}
