//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志和链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化日志与 OpenTelemetry Tracing
///
/// 应在程序启动时调用一次。`filter` 使用 `RUST_LOG` 语法，
/// 设置了 `RUST_LOG` 环境变量时以环境变量为准。
///
/// # 参数
///
/// * `service_name` - 服务名称，作为 tracer 名称
/// * `filter` - 默认日志过滤表达式，例如 `"info"` 或 `"oxpartition=debug"`
///
/// # 返回值
///
/// 已有全局 subscriber 时返回 `false`
pub fn init_tracing(service_name: &str, filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // 未配置 exporter 时 provider 只负责生成 span 上下文
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());

    let subscriber = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
