//! Follow dispatched jobs until none of them can change.

use std::cell::RefCell;
use std::rc::Rc;

use actors::JobManager;
use jobs_core::{Cycle, JobId, Poller, PollerConfig, ProgressBoard, ProgressReport, ProgressSource};

/// Reads progress straight from the manager, answering exactly what the
/// server's progress query would. Ids that got no answer are noted.
struct ManagerProgress {
    manager: JobManager,
    unanswered: Rc<RefCell<Vec<JobId>>>,
}

impl ProgressSource for ManagerProgress {
    async fn fetch(&self, ids: Vec<JobId>) -> Result<ProgressReport, String> {
        let report = self
            .manager
            .progress(&ids)
            .await
            .map_err(|e| e.to_string())?;

        self.unanswered
            .borrow_mut()
            .extend(ids.into_iter().filter(|id| report.get(*id).is_none()));
        Ok(report)
    }
}

/// Final state of a watch.
#[derive(Debug)]
pub struct Watched {
    pub board: ProgressBoard,
    /// Jobs whose record disappeared while watched (simple mode deletes
    /// successful jobs). They are no longer on the board.
    pub removed: Vec<JobId>,
}

pub async fn watch(
    manager: JobManager,
    board: ProgressBoard,
    config: &PollerConfig,
    mut observe: impl FnMut(&ProgressBoard, &Cycle),
) -> Watched {
    let unanswered = Rc::new(RefCell::new(Vec::new()));
    let source = ManagerProgress {
        manager,
        unanswered: unanswered.clone(),
    };
    let mut poller = Poller::new(source, board, config);
    let mut removed = Vec::new();

    loop {
        let cycle = poller.cycle().await;
        for id in unanswered.borrow_mut().drain(..) {
            tracing::info!("Job {} is gone from the store", id);
            poller.board_mut().untrack(id);
            removed.push(id);
        }

        observe(poller.board(), &cycle);
        if poller.board().is_settled() {
            return Watched {
                board: poller.board().clone(),
                removed,
            };
        }
        tokio::time::sleep(poller.next_delay()).await;
    }
}
