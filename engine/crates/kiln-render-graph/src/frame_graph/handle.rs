use slotmap::new_key_type;

new_key_type! {
    /// 帧图中虚拟资源的句柄
    ///
    /// 带有版本号，[`super::FrameGraph::clear`] 之后旧句柄会失效
    pub struct FgResourceHandle;
}
