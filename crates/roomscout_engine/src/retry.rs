use std::future::Future;

use engine_logging::{engine_error, engine_warn};
use roomscout_core::RetryPolicy;

use crate::search::SearchError;
use crate::sink::EventSink;
use crate::PipelineEvent;

/// Runs `attempt` until it succeeds, fails with anything but a CAPTCHA, or the
/// policy runs out. Attempts are numbered from 1.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    events: &dyn EventSink,
    mut attempt: F,
) -> Result<T, SearchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut number = 1;
    loop {
        match attempt(number).await {
            Err(SearchError::Captcha) if policy.allows_retry_after(number) => {
                let delay = policy.delay_after(number);
                engine_warn!("captcha on attempt {number}, retrying in {delay:?}");
                events.emit(PipelineEvent::CaptchaBackoff {
                    attempt: number,
                    delay,
                });
                tokio::time::sleep(delay).await;
                number += 1;
            }
            Err(SearchError::Captcha) => {
                engine_error!("captcha persisted after {number} attempt(s), giving up");
                return Err(SearchError::Captcha);
            }
            other => return other,
        }
    }
}
