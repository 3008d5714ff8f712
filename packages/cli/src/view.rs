//! Terminal rendering of a progress board.

use jobs_core::{ProgressBoard, TrackedJob};

const BAR_WIDTH: usize = 30;

/// `[#########.....]  45% (9/20)` for jobs with progress, the status otherwise.
pub fn progress_line(job: &TrackedJob) -> String {
    if !job.show_progress {
        return format!("{} {}", job.id, job.status);
    }

    let filled = BAR_WIDTH * usize::from(job.percent.min(100)) / 100;
    format!(
        "{} [{}{}] {:>3}% ({}/{}) {}",
        job.id,
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        job.percent,
        job.current,
        job.max,
        job.status
    )
}

/// One line per tracked job.
pub fn render_board(board: &ProgressBoard) -> String {
    board
        .jobs()
        .iter()
        .map(progress_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Final summary printed once the board has settled.
pub fn status_table(board: &ProgressBoard) -> String {
    let mut out = format!("{:<28} {:<12} {:>10}\n", "JOB", "STATUS", "PROGRESS");
    for job in board.jobs() {
        out.push_str(&format!(
            "{:<28} {:<12} {:>10}\n",
            job.id.to_string(),
            job.status,
            format!("{}/{}", job.current, job.max)
        ));
    }
    if let Some(metadata) = board.metadata() {
        out.push('\n');
        out.push_str(metadata);
        out.push('\n');
    }
    out
}
