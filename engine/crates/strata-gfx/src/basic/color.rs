/// debug label 的颜色（RGBA）
pub struct LabelColor;
impl LabelColor {
    pub const COLOR_PASS: [f32; 4] = [0.2, 0.6, 1.0, 1.0];
    pub const COLOR_STAGE: [f32; 4] = [0.8, 0.4, 0.1, 1.0];
    pub const COLOR_CMD: [f32; 4] = [0.4, 0.8, 0.4, 1.0];
}
