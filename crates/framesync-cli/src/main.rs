//! Headless scenario harness: replays a scripted event sequence against a
//! bridge wired to the reference surface and prints the outbound protocol
//! traffic as JSON lines. A debugging and QA tool — the real embedder is a
//! browser script, but the bridge cannot tell the difference.

use anyhow::{Context, Result};
use framesync_config::Config;
use framesync_engine::bridge::{Bridge, BridgeOptions, SurfaceEvent};
use framesync_engine::model::DocumentModel;
use framesync_engine::protocol::{HostMessage, RequestId, TransformOp};
use framesync_engine::sim::{self, SimOptions, SimSurface};
use framesync_engine::tuning::Tuning;
use serde::Deserialize;
use std::{env, path::PathBuf, process};

#[derive(Debug, Deserialize)]
struct Scenario {
    document: DocumentModel,
    /// Origin the scripted host messages claim to come from.
    #[serde(default = "default_origin")]
    origin: String,
    #[serde(default)]
    options: ScenarioOptions,
    events: Vec<ScenarioEvent>,
}

fn default_origin() -> String {
    "https://editor.example.com".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScenarioOptions {
    wrappers: bool,
    whitespace_artifacts: bool,
    direct_controls: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScenarioEvent {
    Frame {
        now: u64,
    },
    Click {
        unit: String,
    },
    SelectUnit {
        unit: String,
        #[serde(default)]
        now: u64,
    },
    Type {
        unit: String,
        field: String,
        value: String,
        #[serde(default)]
        now: u64,
    },
    Command {
        unit: String,
        op: TransformOp,
        #[serde(default)]
        now: u64,
    },
    HostDocument {
        document: DocumentModel,
        #[serde(default)]
        now: u64,
    },
    Flush {
        #[serde(default)]
        now: u64,
    },
    Navigate {
        path: String,
    },
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut show_effects = false;
    let mut scenario_path: Option<PathBuf> = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "--effects" => show_effects = true,
            "--help" | "-h" => {
                println!("Usage: framesync-cli [--effects] <scenario.json>");
                return;
            }
            other => scenario_path = Some(PathBuf::from(other)),
        }
    }
    let Some(scenario_path) = scenario_path else {
        eprintln!("Usage: framesync-cli [--effects] <scenario.json>");
        process::exit(2);
    };

    if let Err(err) = run(&scenario_path, show_effects) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(scenario_path: &PathBuf, show_effects: bool) -> Result<()> {
    let raw = std::fs::read_to_string(scenario_path)
        .with_context(|| format!("reading scenario {}", scenario_path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("parsing scenario {}", scenario_path.display()))?;

    let config = Config::load()?.unwrap_or_default();
    let mut bridge = Bridge::new(BridgeOptions {
        tuning: tuning_from(&config),
        schema: sim::default_schema(&scenario.document),
        trusted_origins: config.trusted_origins.clone(),
    })?;
    let mut surface = SimSurface::new(
        scenario.document.clone(),
        SimOptions {
            wrappers: scenario.options.wrappers,
            whitespace_artifacts: scenario.options.whitespace_artifacts,
            direct_controls: scenario.options.direct_controls,
            ..SimOptions::default()
        },
    );

    let origin = scenario.origin.clone();
    let host = |message: HostMessage, now: u64| SurfaceEvent::HostMessage {
        origin: origin.clone(),
        message,
        now,
    };

    // seed the surface with the initial document, as a real session starts
    let mut events = vec![host(
        HostMessage::Document {
            document: scenario.document.clone(),
            selection: None,
            ack: None,
        },
        0,
    )];
    for event in scenario.events {
        events.push(match event {
            ScenarioEvent::Frame { now } => SurfaceEvent::Frame { now },
            ScenarioEvent::Click { unit } => SurfaceEvent::UnitClicked {
                unit: unit.as_str().into(),
            },
            ScenarioEvent::SelectUnit { unit, now } => host(
                HostMessage::SelectUnit {
                    unit: unit.as_str().into(),
                },
                now,
            ),
            ScenarioEvent::Type {
                unit,
                field,
                value,
                now,
            } => SurfaceEvent::FieldInput {
                unit: unit.as_str().into(),
                field,
                value,
                now,
            },
            ScenarioEvent::Command { unit, op, now } => SurfaceEvent::StructuralCommand {
                unit: unit.as_str().into(),
                op,
                now,
            },
            ScenarioEvent::HostDocument { document, now } => {
                host(HostMessage::Document { document, selection: None, ack: None }, now)
            }
            ScenarioEvent::Flush { now } => host(
                HostMessage::FlushEdits {
                    request: RequestId::fresh(),
                },
                now,
            ),
            ScenarioEvent::Navigate { path } => SurfaceEvent::LocationChanged { path },
        });
    }

    log::info!("replaying {} scripted event(s)", events.len());
    for event in events {
        let outcome = sim::pump(&mut bridge, &mut surface, event);
        for message in &outcome.messages {
            println!("{}", serde_json::to_string(message)?);
        }
        if show_effects {
            for effect in &outcome.effects {
                eprintln!("effect: {effect:?}");
            }
        }
    }
    Ok(())
}

fn tuning_from(config: &Config) -> Tuning {
    let t = &config.tuning;
    Tuning {
        debounce_ms: t.debounce_ms,
        transform_timeout_ms: t.transform_timeout_ms,
        replay_retry_limit: t.replay_retry_limit,
        restore_retry_limit: t.restore_retry_limit,
        nav_poll_interval_ms: t.nav_poll_interval_ms,
        nav_retry_limit: t.nav_retry_limit,
        motion_settle_frames: t.motion_settle_frames,
        motion_class_pattern: t.motion_class_pattern.clone(),
    }
}
