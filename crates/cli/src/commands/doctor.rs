use relaybot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::config::redact_token;
use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["slack_token_readiness", "reactions", "listen"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::plain(exit_code, output);
    }

    CommandResult::plain(exit_code, render_human(&report))
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_reactions(&config));
            checks.push(check_listen(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "slack_token_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "app token {}, bot token {}, bot user `{}`",
            redact_token(config.slack.app_token.expose_secret()),
            redact_token(config.slack.bot_token.expose_secret()),
            config.slack.bot_user_id
        ),
    }
}

fn check_reactions(config: &AppConfig) -> DoctorCheck {
    let steps = [
        ("loading", &config.reactions.loading),
        ("success", &config.reactions.success),
        ("failed", &config.reactions.failed),
    ];
    let summary = steps
        .iter()
        .map(|(step, value)| match value {
            Some(name) => format!("{step}=:{name}:"),
            None => format!("{step}=off"),
        })
        .collect::<Vec<_>>()
        .join(", ");

    DoctorCheck { name: "reactions", status: CheckStatus::Pass, details: summary }
}

fn check_listen(config: &AppConfig) -> DoctorCheck {
    let mut kinds = Vec::new();
    if config.listen.direct_message {
        kinds.push("direct_message");
    }
    if config.listen.mention {
        kinds.push("mention");
    }
    let enabled = kinds.join(", ");

    if config.listen.command {
        return DoctorCheck {
            name: "listen",
            status: CheckStatus::Warn,
            details: format!("listening for {enabled}; `command` is enabled but has no effect"),
        };
    }

    DoctorCheck { name: "listen", status: CheckStatus::Pass, details: format!("listening for {enabled}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
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
