//! 게이트웨이 호출 재시도 유틸리티.
//!
//! 네트워크 오류 등 일시적인 실패에 대해 고정 간격으로 재시도합니다.
//! 한 주기 안에서의 재시도는 짧고 횟수가 제한되며, 지수 백오프를
//! 사용하지 않습니다. 재시도 중 취소 메커니즘은 없고, 주기는 완료되거나
//! 다음 tick으로 넘어갑니다.

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use perp_core::GatewayError;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 재시도 간 고정 대기 시간.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// 재시도가 포함된 비동기 게이트웨이 호출 실행.
///
/// 재시도 가능 에러(`GatewayError::is_retryable`)에 한해
/// 고정 간격으로 재시도하고, 그 외 에러는 즉시 반환합니다.
///
/// # 예시
///
/// ```rust,ignore
/// let result = with_retry(&RetryConfig::default(), || async {
///     gateway.place_market_order(&request).await
/// }).await;
/// ```
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, GatewayError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "재시도 후 성공");
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_retryable() {
                    debug!(error = %e, "재시도 불가능한 에러, 즉시 실패 반환");
                    return Err(e);
                }

                if attempt >= config.max_retries {
                    warn!(
                        error = %e,
                        attempts = attempt + 1,
                        max_retries = config.max_retries,
                        "최대 재시도 횟수 초과"
                    );
                    return Err(e);
                }

                warn!(
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = config.delay.as_millis(),
                    "재시도 대기 중"
                );

                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let result = with_retry(&fast_config(), || async { Ok::<_, GatewayError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_on_network_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(), || {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(GatewayError::Network("연결 실패".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3); // 3번 시도
    }

    #[tokio::test]
    async fn test_no_retry_on_api_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(GatewayError::Api("주문 거부".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1); // 1번만 시도
    }

    #[tokio::test]
    async fn test_max_retries_exceeded() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(GatewayError::Timeout("항상 실패".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3); // 초기 1회 + 재시도 2회
    }
}
