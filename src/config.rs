use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverter: Inverter,

    #[serde(default)]
    pub scheduler: Scheduler,

    /// Seconds to sleep before exiting after the inverter stops answering
    #[serde(default = "Config::default_backoff")]
    pub backoff: u64,

    #[serde(default = "Config::default_operations")]
    pub operations: Vec<String>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    #[serde(default)]
    pub output: Output,
}

// Inverter {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    pub host: String,
    #[serde(default = "Config::default_inverter_port")]
    pub port: u16,
    #[serde(default = "Config::default_inverter_address")]
    pub address: u8,

    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "read_delay_ms")]
    pub read_delay: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "connect_timeout_ms")]
    pub connect_timeout: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "read_timeout_ms")]
    pub read_timeout: Option<Duration>,

    pub use_tcp_nodelay: Option<bool>,
}
impl Inverter {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gap between writing a request and reading its reply.
    pub fn read_delay(&self) -> Duration {
        self.read_delay.unwrap_or(Duration::from_millis(50))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout.unwrap_or(Duration::from_secs(5))
    }

    pub fn use_tcp_nodelay(&self) -> bool {
        self.use_tcp_nodelay.unwrap_or(true)
    }
} // }}}

// Scheduler {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Scheduler {
    /// Seconds between polls; 0 polls once and exits
    #[serde(default = "Config::default_scheduler_interval")]
    pub interval: u64,
    #[serde(default)]
    pub offset: u64,
}
impl Default for Scheduler {
    fn default() -> Self {
        Self {
            interval: Config::default_scheduler_interval(),
            offset: 0,
        }
    }
}
impl Scheduler {
    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn once(&self) -> bool {
        self.interval == 0
    }
} // }}}

// Output {{{
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Output {
    pub console: Option<bool>,
    /// `stdout` or a path, which may contain strftime escapes
    pub csv: Option<String>,
    /// `stdout` or a path, appended to as JSON lines
    pub json: Option<String>,
    pub http: Option<Http>,
    pub mqtt: Option<Mqtt>,
}
impl Output {
    /// Console output is on when asked for, or when nothing else is configured.
    pub fn console(&self) -> bool {
        self.console.unwrap_or_else(|| {
            self.csv.is_none() && self.json.is_none() && self.http.is_none() && self.mqtt.is_none()
        })
    }

    pub fn csv(&self) -> Option<&str> {
        self.csv.as_deref()
    }

    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }

    pub fn http(&self) -> Option<&Http> {
        self.http.as_ref()
    }

    pub fn mqtt(&self) -> Option<&Mqtt> {
        self.mqtt.as_ref()
    }
} // }}}

// Http {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Http {
    pub url: String,
    /// Post the JSON sample as this form field rather than as the body
    pub field: Option<String>,
}
impl Http {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_topic")]
    pub topic: String,
}
impl Mqtt {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
} // }}}

impl Config {
    pub fn new(file: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::parse(&content).with_context(|| format!("invalid configuration in {}", file))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverter.host.is_empty() {
            bail!("inverter.host cannot be empty");
        }
        if self.inverter.port == 0 {
            bail!("inverter.port must be between 1 and 65535");
        }
        if self.inverter.address > 63 {
            bail!("inverter.address must be between 0 and 63");
        }
        if self.inverter.read_timeout() == Duration::ZERO {
            bail!("inverter.read_timeout_ms cannot be 0");
        }

        if self.scheduler.interval > crate::scheduler::MAX_INTERVAL {
            bail!(
                "scheduler.interval {} exceeds {} seconds",
                self.scheduler.interval,
                crate::scheduler::MAX_INTERVAL
            );
        }
        if !self.scheduler.once() && self.scheduler.offset >= self.scheduler.interval {
            bail!(
                "scheduler.offset {} must be less than scheduler.interval {}",
                self.scheduler.offset,
                self.scheduler.interval
            );
        }

        if self.operations.is_empty() {
            bail!("operations cannot be empty");
        }
        // names are checked here so a typo fails at startup, not mid-poll
        PollPlan::new(self.operations.as_slice())?;

        if let Some(http) = &self.output.http {
            if let Err(e) = url::Url::parse(&http.url) {
                bail!("invalid output.http.url {}: {}", http.url, e);
            }
        }

        if let Some(mqtt) = &self.output.mqtt {
            if mqtt.host.is_empty() {
                bail!("output.mqtt.host cannot be empty");
            }
            if mqtt.port == 0 {
                bail!("output.mqtt.port must be between 1 and 65535");
            }
            if mqtt.username.is_some() != mqtt.password.is_some() {
                bail!("output.mqtt.username and output.mqtt.password must be set together");
            }
        }

        Ok(())
    }

    /// Log what was loaded; called once logging is up.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  Inverter:");
        info!("    Host: {}", self.inverter.host);
        info!("    Port: {}", self.inverter.port);
        info!("    Address: {}", self.inverter.address);
        info!("    Read Delay: {:?}", self.inverter.read_delay());
        info!("    Read Timeout: {:?}", self.inverter.read_timeout());
        info!("    TCP NoDelay: {}", self.inverter.use_tcp_nodelay());

        if self.scheduler.once() {
            info!("  Scheduler: single poll");
        } else {
            info!(
                "  Scheduler: every {}s at offset {}s",
                self.scheduler.interval, self.scheduler.offset
            );
        }
        info!("  Backoff: {}s", self.backoff);
        info!("  Operations: {}", self.operations.join(", "));

        info!("  Console: {}", if self.output.console() { "enabled" } else { "disabled" });
        if let Some(csv) = &self.output.csv {
            info!("  CSV: {}", csv);
        }
        if let Some(json) = &self.output.json {
            info!("  JSON: {}", json);
        }
        if let Some(http) = &self.output.http {
            info!("  HTTP: {}", http.url);
        }
        if let Some(mqtt) = &self.output.mqtt {
            info!("  MQTT: {}:{} {}", mqtt.host, mqtt.port, mqtt.topic);
        }
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn inverter(&self) -> &Inverter {
        &self.inverter
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff)
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    fn default_backoff() -> u64 {
        60
    }

    fn default_operations() -> Vec<String> {
        poller::DEFAULT_OPERATIONS.iter().map(|s| s.to_string()).collect()
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_inverter_port() -> u16 {
        8899
    }

    fn default_inverter_address() -> u8 {
        2
    }

    fn default_scheduler_interval() -> u64 {
        10
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_topic() -> String {
        "aurora/sample".to_string()
    }
}
