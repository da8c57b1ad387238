use ridehub_core::config::AppConfig;
use serde::Serialize;

use crate::commands::runtime::{self, GlobalOptions, EXIT_CONFIG, EXIT_RUNTIME};
use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &GlobalOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let config_failed =
        report.checks.first().is_some_and(|check| check.status == CheckStatus::Fail);
    let exit_code = if report.overall_status == CheckStatus::Pass {
        0
    } else if config_failed {
        EXIT_CONFIG
    } else {
        EXIT_RUNTIME
    };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &GlobalOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.load_options()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let session = check_session_readiness(&config, options);
            let session_ready = session.status == CheckStatus::Pass;
            checks.push(session);
            if session_ready {
                checks.push(check_backend_reachability(&config, options));
            } else {
                checks.push(DoctorCheck::skipped(
                    "backend_reachability",
                    "no session is available to authenticate with",
                ));
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck::skipped(
                "session_readiness",
                "configuration did not load",
            ));
            checks.push(DoctorCheck::skipped(
                "backend_reachability",
                "configuration did not load",
            ));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_session_readiness(config: &AppConfig, options: &GlobalOptions) -> DoctorCheck {
    let name = "session_readiness";
    let offline = options.offline.is_some();
    match (&config.session.token, config.session.actor) {
        (_, None) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: "no actor configured; set session.actor, RIDEHUB_SESSION_ACTOR or --as"
                .to_string(),
        },
        (None, Some(actor)) if offline => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("offline session for `{actor}`"),
        },
        (None, Some(_)) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: "no API token configured; set session.token or RIDEHUB_SESSION_TOKEN"
                .to_string(),
        },
        (Some(_), Some(actor)) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("token present for `{actor}`"),
        },
    }
}

fn check_backend_reachability(config: &AppConfig, options: &GlobalOptions) -> DoctorCheck {
    let name = "backend_reachability";
    let async_runtime = match runtime::build_runtime() {
        Ok(async_runtime) => async_runtime,
        Err(error) => {
            return DoctorCheck {
                name,
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let target = match &options.offline {
        Some(path) => format!("offline fixture `{}`", path.display()),
        None => format!("`{}`", config.api.base_url),
    };

    let result = async_runtime.block_on(async {
        let service =
            runtime::connect(config, options).await.map_err(|error| format!("{error:#}"))?;
        service.refresh().await.map_err(|error| error.to_string())
    });

    match result {
        Ok(snapshot) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("listed {} bookings from {target}", snapshot.counts.total),
        },
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("could not list bookings from {target}: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
