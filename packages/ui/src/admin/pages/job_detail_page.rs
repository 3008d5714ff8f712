//! Job detail page - one job with its progress and metadata.

use dioxus::prelude::*;
use jobs_core::{Job, JobId, TrackedJob, render_metadata_block};

use crate::admin::{ProgressBar, StatusBadge};
use crate::use_progress_board;

/// Props for AdminJobDetailPage.
#[derive(Props, Clone, PartialEq)]
pub struct AdminJobDetailPageProps {
    pub job_id: String,
}

/// Job detail page component.
#[component]
pub fn AdminJobDetailPage(props: AdminJobDetailPageProps) -> Element {
    let job_id = props.job_id.clone();

    let mut job = use_signal(|| None::<Job>);
    let mut watched = use_signal(Vec::<Job>::new);
    let mut error = use_signal(|| None::<String>);
    let mut notice = use_signal(|| None::<String>);

    let board = use_progress_board(watched);

    let jid = job_id.clone();
    let _loader = use_resource(move || {
        let jid = jid.clone();
        async move {
            match api::get_job(jid.clone()).await {
                Ok(Some(j)) => {
                    watched.set(vec![j.clone()]);
                    job.set(Some(j));
                }
                Ok(None) => error.set(Some(format!("Job {} not found", jid))),
                Err(e) => error.set(Some(format!("Failed to load job: {}", e))),
            }
        }
    });

    let jid = job_id.clone();
    let on_cancel = move |_| {
        let jid = jid.clone();
        spawn(async move {
            match api::request_cancel(jid).await {
                Ok(true) => notice.set(Some("Cancellation requested".to_string())),
                Ok(false) => notice.set(Some("Job has already finished".to_string())),
                Err(e) => error.set(Some(format!("Failed to cancel job: {}", e))),
            }
        });
    };

    let jid = job_id.clone();
    let on_force_cancel = move |_| {
        let jid = jid.clone();
        spawn(async move {
            match api::force_cancel(jid.clone()).await {
                Ok(_) => {
                    if let Ok(Some(j)) = api::get_job(jid).await {
                        watched.set(vec![j.clone()]);
                        job.set(Some(j));
                    }
                }
                Err(e) => error.set(Some(format!("Failed to stop job: {}", e))),
            }
        });
    };

    let tracked: Option<TrackedJob> = JobId::parse(&job_id)
        .ok()
        .and_then(|id| board.read().get(id).cloned());
    let metadata = board
        .read()
        .metadata()
        .map(str::to_string)
        .or_else(|| job().map(|j| render_metadata_block(&j.metadata)))
        .filter(|block| !block.is_empty());

    rsx! {
        div { class: "page-container",
            nav { class: "breadcrumb",
                Link { to: "/admin/jobs", class: "breadcrumb-link", "Jobs" }
                span { class: "breadcrumb-separator", "/" }
                span { class: "breadcrumb-current", "Job Details" }
            }

            if let Some(err) = error() {
                div { class: "error-banner",
                    span { "{err}" }
                    button {
                        onclick: move |_| error.set(None),
                        "×"
                    }
                }
            }

            if let Some(message) = notice() {
                div { class: "notice-banner", "{message}" }
            }

            if let Some(j) = job() {
                {
                    let tracked = tracked.unwrap_or_else(|| TrackedJob::from_job(&j));
                    let created = j.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
                    let updated = j.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
                    let owner = j.owner.clone().unwrap_or_else(|| "-".to_string());
                    let context = if j.is_privileged { "Operator" } else { "User" };

                    rsx! {
                        div { class: "page-header",
                            div { class: "page-header-content",
                                div { class: "page-header-title-row",
                                    h1 { class: "page-title", "{j.label}" }
                                    StatusBadge { code: tracked.status_code }
                                }
                                p { class: "page-description job-id-display", "{j.id}" }
                            }
                            div { class: "page-header-actions",
                                if tracked.show_progress {
                                    button {
                                        class: "btn btn-cancel",
                                        disabled: j.is_canceled,
                                        onclick: on_cancel,
                                        "Cancel Job"
                                    }
                                    button {
                                        class: "btn btn-danger",
                                        onclick: on_force_cancel,
                                        "Stop now"
                                    }
                                }
                            }
                        }

                        ProgressBar { job: tracked.clone() }

                        div { class: "detail-grid",
                            div { class: "card",
                                div { class: "card-header",
                                    h2 { class: "card-title", "Basic Information" }
                                }
                                div { class: "card-body",
                                    div { class: "detail-list",
                                        div { class: "detail-item",
                                            span { class: "detail-label", "Progress" }
                                            span { class: "detail-value tabular-nums",
                                                "{tracked.current} / {tracked.max}"
                                            }
                                        }
                                        div { class: "detail-item",
                                            span { class: "detail-label", "Owner" }
                                            span { class: "detail-value", "{owner} ({context})" }
                                        }
                                        div { class: "detail-item",
                                            span { class: "detail-label", "Cancel requested" }
                                            span { class: "detail-value",
                                                if j.is_canceled { "Yes" } else { "No" }
                                            }
                                        }
                                        div { class: "detail-item",
                                            span { class: "detail-label", "Created" }
                                            span { class: "detail-value tabular-nums", "{created}" }
                                        }
                                        div { class: "detail-item",
                                            span { class: "detail-label", "Updated" }
                                            span { class: "detail-value tabular-nums", "{updated}" }
                                        }
                                    }
                                }
                            }

                            if let Some(block) = metadata {
                                div { class: "card",
                                    div { class: "card-header",
                                        h2 { class: "card-title", "Metadata" }
                                    }
                                    div { class: "card-body",
                                        pre { class: "payload-json", "{block}" }
                                    }
                                }
                            }
                        }
                    }
                }
            } else if error().is_none() {
                div { class: "loading", "Loading job..." }
            }
        }
    }
}
