//! Client-side progress polling.
//!
//! A [`ProgressBoard`] is the presentation model of the jobs a view shows.
//! A [`Poller`] repeatedly asks a [`ProgressSource`] for the jobs that can
//! still change and folds the answer back into the board. Timers are
//! supplied by the caller so the same loop runs under tokio and in the
//! browser.

use std::future::Future;
use std::time::Duration;

use ulid::Ulid;

use crate::{Job, JobId, JobProgress, JobStatus, ProgressReport};

/// Polling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Delay between cycles while the backend answers.
    pub interval: Duration,
    /// Upper bound for the delay after repeated failures.
    pub max_backoff: Duration,
    /// Relative jitter applied to failure delays (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

/// One job as the view currently shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedJob {
    pub id: JobId,
    /// Last known status code.
    pub status_code: u8,
    /// Last known status label.
    pub status: String,
    pub current: u64,
    pub max: u64,
    pub percent: u8,
    /// Progress bar, progress text and cancel controls are displayed.
    pub show_progress: bool,
}

impl TrackedJob {
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id,
            status_code: job.status.code(),
            status: job.status.label().to_string(),
            current: job.progress,
            max: job.progress_max,
            percent: job.progress_percent(),
            show_progress: !job.status.is_terminal(),
        }
    }

    pub fn from_progress(progress: &JobProgress) -> Self {
        Self {
            id: progress.id,
            status_code: progress.status_code,
            status: progress.status.clone(),
            current: progress.progress_current,
            max: progress.progress_max,
            percent: progress.percent,
            show_progress: !progress.is_finished(),
        }
    }

    /// The last known status is not terminal, so the job may still change.
    pub fn is_changeable(&self) -> bool {
        self.status_code < JobStatus::Complete.code()
    }
}

/// Presentation model for a set of displayed jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressBoard {
    jobs: Vec<TrackedJob>,
    metadata: Option<String>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut board = Self::new();
        for job in jobs {
            board.track(TrackedJob::from_job(job));
        }
        board
    }

    /// Start displaying a job, replacing any previous entry for the same id.
    pub fn track(&mut self, job: TrackedJob) {
        match self.jobs.iter_mut().find(|tracked| tracked.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    pub fn untrack(&mut self, id: JobId) {
        self.jobs.retain(|tracked| tracked.id != id);
    }

    pub fn jobs(&self) -> &[TrackedJob] {
        &self.jobs
    }

    pub fn get(&self, id: JobId) -> Option<&TrackedJob> {
        self.jobs.iter().find(|tracked| tracked.id == id)
    }

    /// Rendered metadata block from the last report that carried one.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Ids to include in the next progress request.
    pub fn changeable_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|tracked| tracked.is_changeable())
            .map(|tracked| tracked.id)
            .collect()
    }

    /// Nothing left to poll for.
    pub fn is_settled(&self) -> bool {
        !self.jobs.iter().any(TrackedJob::is_changeable)
    }

    /// Fold a progress report into the board.
    ///
    /// Finished jobs lose their progress affordances; the rest get fresh
    /// current/max/percent values. Ids the view does not show are ignored.
    pub fn apply(&mut self, report: &ProgressReport) {
        if let Some(metadata) = &report.metadata {
            self.metadata = Some(metadata.clone());
        }

        for progress in &report.jobs {
            let Some(tracked) = self.jobs.iter_mut().find(|t| t.id == progress.id) else {
                continue;
            };

            tracked.status_code = progress.status_code;
            tracked.status = progress.status.clone();

            if progress.is_finished() {
                tracked.show_progress = false;
                continue;
            }

            tracked.current = progress.progress_current;
            tracked.max = progress.progress_max;
            tracked.percent = progress.percent;
        }
    }
}

/// Delay policy between polling cycles.
///
/// Successful cycles wait the fixed interval. Each consecutive failure
/// doubles the delay up to `max_backoff`, with jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    max_backoff: Duration,
    jitter: f64,
    failures: u32,
}

impl Backoff {
    pub fn new(config: &PollerConfig) -> Self {
        Self {
            interval: config.interval,
            max_backoff: config.max_backoff.max(config.interval),
            jitter: config.jitter.clamp(0.0, 1.0),
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    /// Delay before jitter.
    pub fn base_delay(&self) -> Duration {
        if self.failures == 0 {
            return self.interval;
        }
        let factor = 2u32.saturating_pow(self.failures.min(16));
        self.interval
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    /// Delay to wait before the next cycle.
    pub fn next_delay(&self) -> Duration {
        if self.failures == 0 {
            return self.interval;
        }
        jittered(self.base_delay(), self.jitter, random_unit())
    }
}

/// Scale `base` by a factor in `[1 - fraction, 1 + fraction]` chosen by `unit` in `[0, 1]`.
pub fn jittered(base: Duration, fraction: f64, unit: f64) -> Duration {
    let factor = 1.0 - fraction + 2.0 * fraction * unit.clamp(0.0, 1.0);
    base.mul_f64(factor.max(0.0))
}

fn random_unit() -> f64 {
    (Ulid::new().random() % 10_000) as f64 / 10_000.0
}

/// Backend answering batched progress queries.
pub trait ProgressSource {
    fn fetch(&self, ids: Vec<JobId>) -> impl Future<Output = Result<ProgressReport, String>>;
}

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Cycle {
    /// No changeable job; no request was sent.
    Idle,
    /// A report was received and applied.
    Updated,
    /// The request failed; the board is unchanged.
    Failed(String),
}

/// Fixed-interval polling loop over a [`ProgressBoard`].
pub struct Poller<S> {
    source: S,
    board: ProgressBoard,
    backoff: Backoff,
}

impl<S: ProgressSource> Poller<S> {
    pub fn new(source: S, board: ProgressBoard, config: &PollerConfig) -> Self {
        Self {
            source,
            board,
            backoff: Backoff::new(config),
        }
    }

    pub fn board(&self) -> &ProgressBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut ProgressBoard {
        &mut self.board
    }

    pub fn next_delay(&self) -> Duration {
        self.backoff.next_delay()
    }

    /// Run a single cycle: one batched request for every changeable job.
    pub async fn cycle(&mut self) -> Cycle {
        let ids = self.board.changeable_ids();
        if ids.is_empty() {
            self.backoff.record_success();
            return Cycle::Idle;
        }

        match self.source.fetch(ids).await {
            Ok(report) => {
                self.board.apply(&report);
                self.backoff.record_success();
                Cycle::Updated
            }
            Err(error) => {
                self.backoff.record_failure();
                Cycle::Failed(error)
            }
        }
    }

    /// Poll forever, calling `observe` after every cycle.
    pub async fn run<F, Fut>(mut self, mut sleep: F, mut observe: impl FnMut(&ProgressBoard, &Cycle))
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let cycle = self.cycle().await;
            observe(&self.board, &cycle);
            sleep(self.next_delay()).await;
        }
    }

    /// Poll until no displayed job can change, then return the final board.
    pub async fn run_until_settled<F, Fut>(
        mut self,
        mut sleep: F,
        mut observe: impl FnMut(&ProgressBoard, &Cycle),
    ) -> ProgressBoard
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let cycle = self.cycle().await;
            observe(&self.board, &cycle);
            if self.board.is_settled() {
                return self.board;
            }
            sleep(self.next_delay()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    fn tracked(status: JobStatus) -> TrackedJob {
        let mut job = Job::new("tracked");
        job.status = status;
        TrackedJob::from_job(&job)
    }

    fn progress(id: JobId, status: JobStatus, current: u64, max: u64) -> JobProgress {
        let mut job = Job::new("progress");
        job.id = id;
        job.status = status;
        job.progress = current;
        job.progress_max = max;
        JobProgress::from(&job)
    }

    #[derive(Default)]
    struct ScriptedSource {
        requests: RefCell<Vec<Vec<JobId>>>,
        replies: RefCell<VecDeque<Result<ProgressReport, String>>>,
    }

    impl ProgressSource for &ScriptedSource {
        async fn fetch(&self, ids: Vec<JobId>) -> Result<ProgressReport, String> {
            self.requests.borrow_mut().push(ids);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".into()))
        }
    }

    #[tokio::test]
    async fn completed_jobs_are_left_out_of_the_request() {
        let queued = tracked(JobStatus::Queued);
        let running = tracked(JobStatus::InProgress);
        let done = tracked(JobStatus::Complete);
        let mut board = ProgressBoard::new();
        board.track(queued.clone());
        board.track(running.clone());
        board.track(done.clone());

        let source = ScriptedSource::default();
        source
            .replies
            .borrow_mut()
            .push_back(Ok(ProgressReport::default()));

        let mut poller = Poller::new(&source, board, &PollerConfig::default());
        assert_eq!(poller.cycle().await, Cycle::Updated);

        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], vec![queued.id, running.id]);
    }

    #[tokio::test]
    async fn nothing_is_requested_when_every_job_is_terminal() {
        let mut board = ProgressBoard::new();
        board.track(tracked(JobStatus::Error));
        board.track(tracked(JobStatus::Stopped));

        let source = ScriptedSource::default();
        let mut poller = Poller::new(&source, board, &PollerConfig::default());
        assert_eq!(poller.cycle().await, Cycle::Idle);
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn apply_updates_running_jobs_and_clears_finished_ones() {
        let running = tracked(JobStatus::InProgress);
        let finishing = tracked(JobStatus::InProgress);
        let mut board = ProgressBoard::new();
        board.track(running.clone());
        board.track(finishing.clone());

        board.apply(&ProgressReport {
            jobs: vec![
                progress(running.id, JobStatus::InProgress, 5, 10),
                progress(finishing.id, JobStatus::Complete, 10, 10),
            ],
            metadata: Some("message: ok".into()),
        });

        let running = board.get(running.id).unwrap();
        assert!(running.show_progress);
        assert_eq!((running.current, running.max, running.percent), (5, 10, 50));

        let finishing = board.get(finishing.id).unwrap();
        assert!(!finishing.show_progress);
        assert_eq!(finishing.status_code, JobStatus::Complete.code());
        assert_eq!(board.metadata(), Some("message: ok"));
        assert_eq!(board.changeable_ids(), vec![running.id]);
    }

    #[test]
    fn full_bar_hides_affordances_but_keeps_polling_until_terminal() {
        let job = tracked(JobStatus::InProgress);
        let mut board = ProgressBoard::new();
        board.track(job.clone());

        board.apply(&ProgressReport {
            jobs: vec![progress(job.id, JobStatus::InProgress, 10, 10)],
            metadata: None,
        });

        assert!(!board.get(job.id).unwrap().show_progress);
        assert_eq!(board.changeable_ids(), vec![job.id]);
    }

    #[tokio::test]
    async fn failures_back_off_and_success_resets() {
        let job = tracked(JobStatus::InProgress);
        let mut board = ProgressBoard::new();
        board.track(job.clone());

        let source = ScriptedSource::default();
        source.replies.borrow_mut().extend([
            Err("down".to_string()),
            Err("still down".to_string()),
            Ok(ProgressReport::default()),
        ]);

        let config = PollerConfig::default();
        let mut poller = Poller::new(&source, board.clone(), &config);

        assert_eq!(poller.cycle().await, Cycle::Failed("down".into()));
        assert_eq!(poller.board(), &board);
        assert_eq!(poller.backoff.base_delay(), Duration::from_secs(4));

        poller.cycle().await;
        assert_eq!(poller.backoff.base_delay(), Duration::from_secs(8));
        let delay = poller.next_delay();
        assert!(delay >= Duration::from_secs(6) && delay <= Duration::from_secs(10));

        assert_eq!(poller.cycle().await, Cycle::Updated);
        assert_eq!(poller.next_delay(), config.interval);
    }

    #[test]
    fn backoff_is_capped() {
        let config = PollerConfig::default();
        let mut backoff = Backoff::new(&config);
        for _ in 0..40 {
            backoff.record_failure();
        }
        assert_eq!(backoff.base_delay(), config.max_backoff);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(10);
        let close = |a: Duration, b: Duration| a.abs_diff(b) < Duration::from_millis(1);
        assert!(close(jittered(base, 0.2, 0.0), Duration::from_secs(8)));
        assert!(close(jittered(base, 0.2, 1.0), Duration::from_secs(12)));
        assert!(close(jittered(base, 0.2, 5.0), Duration::from_secs(12)));
        assert!(close(jittered(base, 0.0, 0.7), base));
    }

    #[tokio::test]
    async fn run_until_settled_stops_once_jobs_finish() {
        let job = tracked(JobStatus::Queued);
        let mut board = ProgressBoard::new();
        board.track(job.clone());

        let source = ScriptedSource::default();
        source.replies.borrow_mut().extend([
            Ok(ProgressReport {
                jobs: vec![progress(job.id, JobStatus::InProgress, 1, 2)],
                metadata: None,
            }),
            Ok(ProgressReport {
                jobs: vec![progress(job.id, JobStatus::Complete, 2, 2)],
                metadata: None,
            }),
        ]);

        let sleeps = RefCell::new(Vec::new());
        let mut cycles = 0;
        let poller = Poller::new(&source, board, &PollerConfig::default());
        let board = poller
            .run_until_settled(
                |delay| {
                    sleeps.borrow_mut().push(delay);
                    async {}
                },
                |_, _| cycles += 1,
            )
            .await;

        assert!(board.is_settled());
        assert_eq!(cycles, 2);
        assert_eq!(sleeps.borrow().as_slice(), &[Duration::from_secs(2)]);
    }
}
