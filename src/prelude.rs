pub use anyhow::{anyhow, bail, Context, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;

pub use crate::{
    aurora,
    aurora::inverter::Client,
    command,
    command::{Operation, OperationCommon},
    config,
    config::Config,
    error::Error,
    options::Options,
    poller,
    poller::{PollJob, PollPlan, Sample, Value},
    scheduler::{Clock, Job, Scheduler, SystemClock},
    sink::Sink,
    utils::Utils,
};
