//! 流水线参数

/// 流水线参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// 世界模型抽取每批章节数
    pub extraction_batch_size: usize,
    /// 连续性审计窗口 K
    pub continuity_window: usize,
    /// 文风节奏审计窗口 M（M > K）
    pub voice_window: usize,
    /// 终审最大轮数
    pub max_review_passes: u32,
    /// 批准阈值（0-10）
    pub approval_threshold: u8,
    /// 同一阶段内并发的生成调用数
    pub max_concurrent_calls: usize,
    /// 重复章节判定阈值
    pub duplicate_similarity: f64,
    /// 修订后长度允许的偏差比例
    pub length_tolerance: f64,
    /// 时代错置审计的抽样章节数
    pub anachronism_sample_size: usize,
    /// 摘要降级时截取的字符数
    pub excerpt_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extraction_batch_size: 10,
            continuity_window: 5,
            voice_window: 10,
            max_review_passes: 5,
            approval_threshold: 9,
            max_concurrent_calls: 4,
            duplicate_similarity: 0.85,
            length_tolerance: 0.10,
            anachronism_sample_size: 5,
            excerpt_chars: 600,
        }
    }
}
