//! Progress bar component.

use dioxus::prelude::*;
use jobs_core::TrackedJob;

/// Bar and `current / max` text for a tracked job.
///
/// Renders nothing once the job finished or the bar is full.
#[component]
pub fn ProgressBar(job: TrackedJob) -> Element {
    if !job.show_progress {
        return rsx! {};
    }

    let percent = job.percent;
    rsx! {
        div { class: "progress",
            div { class: "progress-track",
                div {
                    class: "progress-fill",
                    style: "width: {percent}%",
                }
            }
            span { class: "progress-text tabular-nums",
                "{job.current} / {job.max} ({percent}%)"
            }
        }
    }
}
