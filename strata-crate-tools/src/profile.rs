//! tracy span 的包装
//!
//! `tracy_client::span!` 在没有运行中的 client 时会 panic，
//! 这里只在 client 已经启动时才创建 span。

/// 创建一个作用域 span，返回 `Option<tracy_client::Span>`
///
/// 需要绑定到变量上，否则 span 立即结束：
/// ```ignore
/// let _span = strata_crate_tools::profile_span!("RenderGraph::compile");
/// ```
#[macro_export]
macro_rules! profile_span {
    ($name:expr) => {
        $crate::__tracy_client::Client::running()
            .map(|client| client.span($crate::__tracy_client::span_location!($name), 0))
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_span_without_client_is_noop() {
        let span = crate::profile_span!("test");
        assert!(span.is_none());
    }
}
