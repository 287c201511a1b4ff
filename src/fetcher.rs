use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::client::{FetchError, SearchPage};
use crate::query::SearchQuery;

pub const PAGE_DELAY: Duration = Duration::from_millis(1200);
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Anything that can answer a `/studies` page request.
pub trait PageSource {
    fn fetch_page(&mut self, params: &[(String, String)]) -> Result<SearchPage, FetchError>;
}

/// Blocks between requests. Swapped out in tests to record delays.
pub trait Throttle {
    fn pause(&mut self, duration: Duration);
}

pub struct ThreadSleep;

impl Throttle for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Fetching,
    Retrying,
    Exhausted,
    Truncated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Page { has_token: bool },
    Failure,
}

impl FetchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FetchState::Exhausted | FetchState::Truncated | FetchState::Failed
        )
    }

    /// Transition after a request completes. `pages_fetched` includes the page
    /// just received, if any.
    pub fn advance(self, outcome: PageOutcome, pages_fetched: u32, max_pages: Option<u32>) -> FetchState {
        if self.is_terminal() {
            return self;
        }
        match outcome {
            PageOutcome::Page { has_token: false } => FetchState::Exhausted,
            PageOutcome::Page { has_token: true } => match max_pages {
                Some(cap) if pages_fetched >= cap => FetchState::Truncated,
                _ => FetchState::Fetching,
            },
            PageOutcome::Failure if self == FetchState::Fetching => FetchState::Retrying,
            PageOutcome::Failure => FetchState::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_pages: Option<u32>,
    pub page_delay: Duration,
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            max_pages: None,
            page_delay: PAGE_DELAY,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Where a fetch ended up. `error` is set only for `Failed`.
#[derive(Debug)]
pub struct FetchSummary {
    pub state: FetchState,
    pub pages_fetched: u32,
    pub records: u64,
    pub total_count: Option<u64>,
    pub error: Option<FetchError>,
}

impl FetchSummary {
    /// Studies left on the server when the fetch stopped early.
    pub fn remaining(&self) -> u64 {
        match (self.state, self.total_count) {
            (FetchState::Exhausted, _) | (_, None) => 0,
            (_, Some(total)) => total.saturating_sub(self.records),
        }
    }
}

/// Lazy, single-pass iterator over the studies of a search.
///
/// The discovery request happens in [`Pager::start`] and is never retried.
/// Every later page waits `page_delay` first; a failed page is retried once
/// after `retry_delay`, and a second failure ends iteration with the error
/// kept for [`Pager::finish`].
pub struct Pager<S, T> {
    source: S,
    throttle: T,
    options: FetchOptions,
    base_params: Vec<(String, String)>,
    buffer: VecDeque<Value>,
    token: Option<String>,
    state: FetchState,
    pages_fetched: u32,
    records: u64,
    total_count: Option<u64>,
    error: Option<FetchError>,
}

impl<S: PageSource, T: Throttle> Pager<S, T> {
    pub fn start(
        mut source: S,
        throttle: T,
        query: &SearchQuery,
        options: FetchOptions,
    ) -> Result<Self, FetchError> {
        let base_params = query.to_params();
        let mut first = base_params.clone();
        first.push(("countTotal".to_string(), "true".to_string()));

        let page = source.fetch_page(&first)?;
        info!(total = ?page.total_count, "Discovery request complete");

        let mut pager = Pager {
            source,
            throttle,
            options,
            base_params,
            buffer: VecDeque::new(),
            token: None,
            state: FetchState::Fetching,
            pages_fetched: 0,
            records: 0,
            total_count: page.total_count,
            error: None,
        };
        pager.accept(page);
        Ok(pager)
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn finish(self) -> FetchSummary {
        FetchSummary {
            state: self.state,
            pages_fetched: self.pages_fetched,
            records: self.records,
            total_count: self.total_count,
            error: self.error,
        }
    }

    fn accept(&mut self, page: SearchPage) {
        self.pages_fetched += 1;
        self.token = page.next_page_token.filter(|t| !t.is_empty());
        self.buffer.extend(page.studies);
        let outcome = PageOutcome::Page {
            has_token: self.token.is_some(),
        };
        self.state = self
            .state
            .advance(outcome, self.pages_fetched, self.options.max_pages);
    }

    fn next_params(&self) -> Vec<(String, String)> {
        let mut params = self.base_params.clone();
        if let Some(token) = &self.token {
            params.push(("pageToken".to_string(), token.clone()));
        }
        params
    }

    /// Request the next page, retrying once. Leaves the pager in a new state.
    fn fetch_next(&mut self) {
        let params = self.next_params();
        self.throttle.pause(self.options.page_delay);

        loop {
            match self.source.fetch_page(&params) {
                Ok(page) => {
                    self.accept(page);
                    return;
                }
                Err(e) => {
                    let page = self.pages_fetched + 1;
                    self.state = self.state.advance(
                        PageOutcome::Failure,
                        self.pages_fetched,
                        self.options.max_pages,
                    );
                    if self.state == FetchState::Failed {
                        warn!(page, error = %e, "Retry failed, stopping with partial results");
                        self.error = Some(e);
                        return;
                    }
                    warn!(
                        page,
                        error = %e,
                        "Request failed, retrying in {:.1}s",
                        self.options.retry_delay.as_secs_f64()
                    );
                    self.throttle.pause(self.options.retry_delay);
                }
            }
        }
    }
}

impl<S: PageSource, T: Throttle> Iterator for Pager<S, T> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        loop {
            if let Some(study) = self.buffer.pop_front() {
                self.records += 1;
                return Some(study);
            }
            if self.state.is_terminal() {
                return None;
            }
            self.fetch_next();
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Serves scripted responses in order and records the params it was sent.
    struct Scripted {
        responses: VecDeque<Result<SearchPage, FetchError>>,
        requests: Vec<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<SearchPage, FetchError>>) -> Self {
            Scripted {
                responses: responses.into(),
                requests: Vec::new(),
            }
        }
    }

    impl PageSource for &mut Scripted {
        fn fetch_page(&mut self, params: &[(String, String)]) -> Result<SearchPage, FetchError> {
            self.requests.push(params.to_vec());
            self.responses
                .pop_front()
                .expect("pager requested more pages than scripted")
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<Duration>);

    impl Throttle for &mut Recorder {
        fn pause(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    fn page(ids: &[&str], token: Option<&str>, total: Option<u64>) -> Result<SearchPage, FetchError> {
        Ok(SearchPage {
            studies: ids
                .iter()
                .map(|id| json!({"protocolSection": {"identificationModule": {"nctId": id}}}))
                .collect(),
            total_count: total,
            next_page_token: token.map(str::to_string),
        })
    }

    fn unavailable() -> Result<SearchPage, FetchError> {
        Err(FetchError::Status {
            status: 503,
            reason: "Service Unavailable".into(),
            body: String::new(),
        })
    }

    fn ids(studies: &[Value]) -> Vec<String> {
        studies
            .iter()
            .map(|s| s["protocolSection"]["identificationModule"]["nctId"].as_str().unwrap().to_string())
            .collect()
    }

    fn has(params: &[(String, String)], key: &str) -> Option<String> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn three_pages() -> Vec<Result<SearchPage, FetchError>> {
        vec![
            page(&["A1", "A2"], Some("t1"), Some(5)),
            page(&["B1", "B2"], Some("t2"), None),
            page(&["C1"], None, None),
        ]
    }

    #[test]
    fn stops_on_missing_token() {
        let mut source = Scripted::new(three_pages());
        let mut sleeps = Recorder::default();
        let mut pager = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), FetchOptions::default()).unwrap();
        let studies: Vec<Value> = pager.by_ref().collect();
        let summary = pager.finish();

        assert_eq!(ids(&studies), vec!["A1", "A2", "B1", "B2", "C1"]);
        assert_eq!(summary.state, FetchState::Exhausted);
        assert_eq!(summary.pages_fetched, 3);
        assert_eq!(summary.records, 5);
        assert_eq!(summary.remaining(), 0);
        assert_eq!(source.requests.len(), 3);
    }

    #[test]
    fn page_cap_truncates_and_reports_remaining() {
        let mut source = Scripted::new(three_pages());
        let mut sleeps = Recorder::default();
        let options = FetchOptions {
            max_pages: Some(2),
            ..Default::default()
        };
        let mut pager = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), options).unwrap();
        let studies: Vec<Value> = pager.by_ref().collect();
        let summary = pager.finish();

        assert_eq!(ids(&studies), vec!["A1", "A2", "B1", "B2"]);
        assert_eq!(summary.state, FetchState::Truncated);
        assert_eq!(summary.remaining(), 1);
        assert_eq!(source.requests.len(), 2);
    }

    #[test]
    fn single_page_cap_makes_no_follow_up_request() {
        let mut source = Scripted::new(three_pages());
        let mut sleeps = Recorder::default();
        let options = FetchOptions {
            max_pages: Some(1),
            ..Default::default()
        };
        let pager = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), options).unwrap();
        assert_eq!(pager.state(), FetchState::Truncated);
        assert_eq!(pager.count(), 2);
        assert!(sleeps.0.is_empty());
    }

    #[test]
    fn token_and_count_params_per_page() {
        let mut source = Scripted::new(three_pages());
        let mut sleeps = Recorder::default();
        let pager = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), FetchOptions::default()).unwrap();
        assert_eq!(pager.count(), 5);

        let reqs = &source.requests;
        assert_eq!(has(&reqs[0], "countTotal").as_deref(), Some("true"));
        assert_eq!(has(&reqs[0], "pageToken"), None);
        assert_eq!(has(&reqs[1], "countTotal"), None);
        assert_eq!(has(&reqs[1], "pageToken").as_deref(), Some("t1"));
        assert_eq!(has(&reqs[2], "pageToken").as_deref(), Some("t2"));
        assert!(reqs.iter().all(|r| has(r, "pageSize").as_deref() == Some("2")));
    }

    #[test]
    fn delay_between_pages_but_not_before_first() {
        let mut source = Scripted::new(three_pages());
        let mut sleeps = Recorder::default();
        let pager = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), FetchOptions::default()).unwrap();
        pager.for_each(drop);
        assert_eq!(sleeps.0, vec![PAGE_DELAY, PAGE_DELAY]);
    }

    #[test]
    fn single_failure_is_recovered_by_retry() {
        let mut clean = Scripted::new(three_pages());
        let mut sleeps = Recorder::default();
        let baseline: Vec<Value> =
            Pager::start(&mut clean, &mut sleeps, &SearchQuery::new(2), FetchOptions::default())
                .unwrap()
                .collect();

        let mut flaky = Scripted::new(vec![
            page(&["A1", "A2"], Some("t1"), Some(5)),
            unavailable(),
            page(&["B1", "B2"], Some("t2"), None),
            page(&["C1"], None, None),
        ]);
        let mut sleeps = Recorder::default();
        let mut pager = Pager::start(&mut flaky, &mut sleeps, &SearchQuery::new(2), FetchOptions::default()).unwrap();
        let studies: Vec<Value> = pager.by_ref().collect();
        let summary = pager.finish();

        assert_eq!(studies, baseline);
        assert_eq!(summary.state, FetchState::Exhausted);
        assert!(summary.error.is_none());
        assert_eq!(sleeps.0, vec![PAGE_DELAY, RETRY_DELAY, PAGE_DELAY]);
        // the retry repeats the same token
        assert_eq!(has(&flaky.requests[1], "pageToken"), has(&flaky.requests[2], "pageToken"));
    }

    #[test]
    fn second_failure_aborts_and_keeps_first_page() {
        let mut source = Scripted::new(vec![
            page(&["A1", "A2"], Some("t1"), Some(5)),
            unavailable(),
            unavailable(),
        ]);
        let mut sleeps = Recorder::default();
        let mut pager = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), FetchOptions::default()).unwrap();
        let studies: Vec<Value> = pager.by_ref().collect();
        let summary = pager.finish();

        assert_eq!(ids(&studies), vec!["A1", "A2"]);
        assert_eq!(summary.state, FetchState::Failed);
        assert_eq!(summary.remaining(), 3);
        assert!(matches!(summary.error, Some(FetchError::Status { status: 503, .. })));
        assert_eq!(source.requests.len(), 3);
    }

    #[test]
    fn discovery_failure_is_not_retried() {
        let mut source = Scripted::new(vec![unavailable(), page(&["A1"], None, None)]);
        let mut sleeps = Recorder::default();
        let result = Pager::start(&mut source, &mut sleeps, &SearchQuery::new(2), FetchOptions::default());
        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
        assert_eq!(source.requests.len(), 1);
        assert!(sleeps.0.is_empty());
    }

    #[test]
    fn state_machine_transitions() {
        use FetchState::*;
        use PageOutcome::*;
        let more = Page { has_token: true };
        let last = Page { has_token: false };

        assert_eq!(Fetching.advance(more, 1, None), Fetching);
        assert_eq!(Fetching.advance(more, 3, Some(3)), Truncated);
        assert_eq!(Fetching.advance(last, 3, Some(3)), Exhausted);
        assert_eq!(Fetching.advance(Failure, 1, None), Retrying);
        assert_eq!(Retrying.advance(more, 2, None), Fetching);
        assert_eq!(Retrying.advance(last, 2, None), Exhausted);
        assert_eq!(Retrying.advance(Failure, 1, None), Failed);
        for terminal in [Exhausted, Truncated, Failed] {
            assert_eq!(terminal.advance(more, 9, None), terminal);
            assert_eq!(terminal.advance(Failure, 9, None), terminal);
        }
    }
}
