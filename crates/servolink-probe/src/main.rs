//! Servolink probe binary.
//!
//! Builds an in-memory node, initializes a client for one service and sends
//! a batch of requests through it, logging the sequence number each one was
//! assigned. Publish failures can be injected to watch the numbering skip.
//!
//! # Usage
//!
//! ```bash
//! # Ten requests to /add_two_ints
//! servolink-probe --count 10
//!
//! # Namespaced node, 20% of publishes failing
//! servolink-probe --namespace /robot --service add_two_ints --failure-rate 0.2 --seed 7
//! ```

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use servolink_client::{
    CborTypeSupport, ChaoticNode, Client, ClientOptions, MemoryNode, QosProfile, Reliability,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Request of the probe service
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AddTwoIntsRequest {
    a: i64,
    b: i64,
}

/// Response of the probe service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(dead_code, reason = "the probe only sends requests")]
struct AddTwoIntsResponse {
    sum: i64,
}

static ADD_TWO_INTS: CborTypeSupport<AddTwoIntsRequest, AddTwoIntsResponse> =
    CborTypeSupport::new("example_interfaces/srv/AddTwoInts");

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReliabilityArg {
    Reliable,
    BestEffort,
    SystemDefault,
}

impl From<ReliabilityArg> for Reliability {
    fn from(arg: ReliabilityArg) -> Self {
        match arg {
            ReliabilityArg::Reliable => Self::Reliable,
            ReliabilityArg::BestEffort => Self::BestEffort,
            ReliabilityArg::SystemDefault => Self::SystemDefault,
        }
    }
}

/// Servolink service client probe
#[derive(Parser, Debug)]
#[command(name = "servolink-probe")]
#[command(about = "Send sequence-tagged requests through a service client")]
#[command(version)]
struct Args {
    /// Service name (relative, absolute or `~/private`)
    #[arg(short, long, default_value = "add_two_ints")]
    service: String,

    /// Node name
    #[arg(long, default_value = "servolink_probe")]
    node_name: String,

    /// Node namespace
    #[arg(long, default_value = "")]
    namespace: String,

    /// Number of requests to send
    #[arg(short = 'n', long, default_value = "10")]
    count: u32,

    /// Probability that a publish fails (0.0 to 1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_rate)]
    failure_rate: f64,

    /// Seed for publish failure injection
    #[arg(long, default_value = "1")]
    seed: u64,

    /// QoS history depth
    #[arg(long, default_value = "10")]
    qos_depth: usize,

    /// QoS reliability
    #[arg(long, value_enum, default_value = "reliable")]
    qos_reliability: ReliabilityArg,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("failure rate must be between 0.0 and 1.0, got {rate}"))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let qos = QosProfile {
        depth: args.qos_depth,
        reliability: args.qos_reliability.into(),
        ..QosProfile::SERVICES_DEFAULT
    };
    let options = ClientOptions::default().with_qos(qos);

    let node = ChaoticNode::with_seed(
        MemoryNode::new(&args.node_name, &args.namespace),
        args.failure_rate,
        args.seed,
    );

    let mut client = Client::new(&node, &ADD_TWO_INTS, &args.service, &options)?;
    tracing::info!(
        service = client.service_name().unwrap_or_default(),
        count = args.count,
        failure_rate = args.failure_rate,
        "Probe starting"
    );

    let mut failed = 0u32;
    for i in 0..args.count {
        let request = AddTwoIntsRequest { a: i64::from(i), b: 1 };
        match client.send_request(&request) {
            Ok(sequence_number) => tracing::info!(sequence_number, a = request.a, "Request sent"),
            Err(e) if e.is_transient() => {
                failed += 1;
                tracing::warn!(error = %e, "Request lost");
            },
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        sent = args.count - failed,
        failed,
        last_sequence_number = client.last_sequence_number().unwrap_or_default(),
        published = node.inner().published_count(),
        "Probe finished"
    );

    client.fini(Some(&node))?;
    Ok(())
}
