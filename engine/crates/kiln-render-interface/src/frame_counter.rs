use std::fmt::Display;
use std::ops::Deref;

/// frame in flight 的标签
///
/// 每个标签对应一组独立的 per-frame 资源（uniform、culling 输入、descriptor set）
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameLabel {
    A,
    B,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 2] = [0, 1];

    #[inline]
    pub fn try_from_usize(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    /// # Panics
    /// `idx` 超出 frames in flight 的数量
    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        Self::try_from_usize(idx).unwrap_or_else(|| panic!("Invalid frame index: {idx}"))
    }
}

pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64) -> Self {
        Self {
            frame_id: init_frame_id,
        }
    }
}
impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(0)
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
    /// double buffer
    const FIF_COUNT: usize = 2;
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }
    #[inline]
    pub const fn frame_labels() -> [FrameLabel; Self::FIF_COUNT] {
        [FrameLabel::A, FrameLabel::B]
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_id as usize % Self::fif_count())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}
