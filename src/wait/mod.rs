/*
    Condition polling.

    wait_for_core polls a condition until it reports "stop" or the timeout elapses. The timeout
    only flips a flag that is checked after each poll settles, so an in-flight poll is never
    interrupted and polls never overlap.

    WaitOnce wraps a wait so that it runs at most once per built query node; later performs replay
    the captured outcome.
*/
use crate::execution::NodeThunk;
use crate::imports::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;


/*
    Types:
    * WaitOptions - Optional per-call overrides, recorded in the query description
    * WaitSettings - Effective timeout and poll period after applying config defaults
    * PollOutcome - What one poll produced: whether to stop, and the value to return if so
    * WaitOnce - Once-only wait state owned by a single query node
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitOptions {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_millis"
    )]
    pub timeout: Option<Duration>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_millis"
    )]
    pub poll_period: Option<Duration>,
}

impl WaitOptions {
    pub fn timeout(timeout: Duration) -> Self {
        WaitOptions {
            timeout: Some(timeout),
            poll_period: None,
        }
    }

    pub fn with_poll_period(mut self, poll_period: Duration) -> Self {
        self.poll_period = Some(poll_period);
        self
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_millis() as u64),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub timeout: Duration,
    pub poll_period: Duration,
}

impl WaitSettings {
    /// Explicit options win. Otherwise the timeout comes from the config and the poll period is
    /// `max(min poll period, timeout / poll times)`. Zero durations count as unset.
    /// `config` has been validated by the query it belongs to, so `poll_times` is at least 2.
    pub(crate) fn effective(config: &Config, options: Option<&WaitOptions>) -> Self {
        let timeout = options
            .and_then(|o| o.timeout)
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| config.wait_timeout());
        let poll_period = options
            .and_then(|o| o.poll_period)
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| {
                std::cmp::max(config.min_poll_period(), timeout / config.poll_times)
            });
        WaitSettings {
            timeout,
            poll_period,
        }
    }
}

pub struct PollOutcome<T> {
    pub stop: bool,
    pub value: T,
}

pub type ErrorPolicy<'a> = &'a (dyn Fn(&QueryError) -> bool + Send + Sync);

fn seconds(d: Duration) -> String {
    format!("{}s", d.as_secs_f64())
}

#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(timeout_ms = settings.timeout.as_millis() as u64, poll_ms = settings.poll_period.as_millis() as u64)
)]
pub async fn wait_for_core<T, F, Fut>(
    mut condition: F,
    should_ignore_error: Option<ErrorPolicy<'_>>,
    settings: WaitSettings,
    description: Option<&QueryDescription>,
    tracker: &LogTracker,
) -> QueryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = QueryResult<PollOutcome<T>>>,
{
    let query_info = || {
        description
            .map(|d| format!(" for {}", d.build_description(1)))
            .unwrap_or_default()
    };
    tracker.debug(|| format!("waiting started{}", query_info()));

    let timed_out = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();
    let _cancel_on_exit = cancel.clone().drop_guard();
    {
        let timed_out = timed_out.clone();
        let timeout = settings.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => timed_out.store(true, Ordering::SeqCst),
            }
        });
    }

    let mut times_polled: u64 = 0;
    let timeout_error = |times_polled: u64, cause: Option<QueryError>| {
        let mut message = String::from("Timeout when waiting for condition to be truthy");
        if let Some(d) = description {
            message.push_str(&format!(
                ", when executing a sub-query {}",
                d.build_description(1)
            ));
        }
        message.push_str(&format!(
            "\n  Timeout:      {}\n  Poll Period:  {}\n  Times Polled: {}",
            seconds(settings.timeout),
            seconds(settings.poll_period),
            times_polled
        ));
        QueryError::builder(ErrorKind::Timeout, message)
            .maybe_cause(cause)
            .build()
    };

    loop {
        times_polled += 1;
        match condition().await {
            Ok(outcome) if outcome.stop => {
                tracker.debug(|| format!("timeout cancelled{}", query_info()));
                return Ok(outcome.value);
            }
            Ok(_) => {
                if timed_out.load(Ordering::SeqCst) {
                    tracker.debug(|| format!("timeout has happened{}", query_info()));
                    return Err(timeout_error(times_polled, None));
                }
            }
            Err(err) => {
                let ignored = should_ignore_error.map(|policy| policy(&err)).unwrap_or(true);
                if !ignored {
                    return Err(err);
                }
                if timed_out.load(Ordering::SeqCst) {
                    tracker.debug(|| format!("timeout has happened{}", query_info()));
                    return Err(timeout_error(times_polled, Some(err)));
                }
            }
        }
        tokio::time::sleep(settings.poll_period).await;
    }
}

/// Polls until the condition resolves truthy and returns that value.
pub async fn wait_for<T, F, Fut>(
    mut condition: F,
    should_ignore_error: Option<ErrorPolicy<'_>>,
    settings: WaitSettings,
    description: Option<&QueryDescription>,
    tracker: &LogTracker,
) -> QueryResult<T>
where
    T: Truthy,
    F: FnMut() -> Fut,
    Fut: Future<Output = QueryResult<T>>,
{
    wait_for_core(
        || {
            let poll = condition();
            async move {
                let value = poll.await?;
                Ok(PollOutcome {
                    stop: value.is_truthy(),
                    value,
                })
            }
        },
        should_ignore_error,
        settings,
        description,
        tracker,
    )
    .await
}

/// Once-only wait owned by one query node. The first perform polls `condition`
/// (its first poll runs immediately, so an already satisfied condition costs a
/// single evaluation) and then resolves `pre_wait`; every later perform replays
/// that outcome.
#[derive(Clone)]
pub(crate) struct WaitOnce {
    outcome: Arc<OnceCell<QueryResult<QueryValue>>>,
    pre_wait: Option<NodeThunk>,
    condition: NodeThunk,
    settings: WaitSettings,
    description: QueryDescription,
    should_log: bool,
}

impl WaitOnce {
    /// `pre_wait` of `None` resolves to the value the condition stopped on.
    pub(crate) fn new(
        pre_wait: Option<NodeThunk>,
        condition: NodeThunk,
        settings: WaitSettings,
        description: QueryDescription,
        should_log: bool,
    ) -> Self {
        WaitOnce {
            outcome: Arc::new(OnceCell::new()),
            pre_wait,
            condition,
            settings,
            description,
            should_log,
        }
    }

    pub(crate) async fn perform(&self) -> QueryResult<QueryValue> {
        self.outcome
            .get_or_init(|| async {
                let tracker = QueryLogger::global().start(self.should_log, || {
                    format!("wait once: {}", self.description.build_description(1))
                });
                let condition = self.condition.clone();
                let waited = wait_for(
                    move || condition(),
                    None,
                    self.settings,
                    Some(&self.description),
                    &tracker,
                )
                .await?;
                match &self.pre_wait {
                    Some(pre_wait) => pre_wait().await,
                    None => Ok(waited),
                }
            })
            .await
            .clone()
    }
}
