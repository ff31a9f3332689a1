use crate::prelude::*;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::io::{AsyncRead, AsyncWrite};

/// Polled each cycle when the configuration doesn't list any operations.
pub const DEFAULT_OPERATIONS: &[&str] = &[
    "gridPowerAll",
    "powerPeakToday",
    "dailyEnergy",
    "weeklyEnergy",
    "partialEnergy",
    "getEnergy10",
    "frequencyAll",
    "gridVoltageAll",
    "gridVoltageAverage",
    "gridCurrentAll",
    "bulkVoltageDcDc",
    "in1Voltage",
    "in1Current",
    "in2Voltage",
    "in2Current",
    "pin1All",
    "pin2All",
    "iLeakDcDc",
    "iLeakInverter",
    "boosterTemp",
];

// {{{ Value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(f32),
    Integer(i32),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f64::from(*f)),
            Value::Integer(i) => Some(f64::from(*i)),
            Value::Text(_) | Value::Date(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Integer(v) => serializer.serialize_i32(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Date(v) => serializer.collect_str(&v.format("%Y-%m-%d")),
        }
    }
}
// }}}

// {{{ Sample
/// One cycle's worth of readings: the capture time, then every polled value
/// in the order it was polled.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    utc: DateTime<Utc>,
    values: Vec<(&'static str, Value)>,
}

impl Sample {
    pub const UTC_KEY: &'static str = "utc";

    pub fn new(utc: DateTime<Utc>, values: Vec<(&'static str, Value)>) -> Self {
        Self { utc, values }
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.utc
    }

    pub fn values(&self) -> &[(&'static str, Value)] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// `utc` followed by the operation names, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(Self::UTC_KEY).chain(self.values.iter().map(|(n, _)| *n))
    }
}

impl Serialize for Sample {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry(Self::UTC_KEY, &self.utc)?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
// }}}

// {{{ PollPlan
/// An ordered list of operations, resolved from names before any traffic
/// goes to the inverter.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPlan {
    operations: Vec<Operation>,
}

impl PollPlan {
    pub fn new<N: AsRef<str>>(names: &[N]) -> Result<Self, Error> {
        let operations = names
            .iter()
            .map(|name| Operation::lookup(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { operations })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Runs one cycle. The first failure aborts it; nothing partial escapes.
    pub async fn poll<S>(&self, client: &mut Client<S>) -> Result<Sample, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let utc = Utils::utc();
        debug!("polling at {}", utc);

        let mut values = Vec::with_capacity(self.operations.len());
        for op in &self.operations {
            let payload = client.execute(op.opcode(), op.sub_opcode()).await?;
            values.push((op.name(), op.decode(&payload)?));
        }

        Ok(Sample::new(utc, values))
    }
}

/// Resolves `names` and runs a single cycle against `client`.
pub async fn poll<N, S>(names: &[N], client: &mut Client<S>) -> Result<Sample, Error>
where
    N: AsRef<str>,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    PollPlan::new(names)?.poll(client).await
}
// }}}

// {{{ PollJob
/// A poll cycle bound to its client and consumer, ready for the scheduler.
pub struct PollJob<S> {
    client: Client<S>,
    plan: PollPlan,
    sink: Box<dyn Sink>,
    cycles: u64,
}

impl<S> PollJob<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(client: Client<S>, plan: PollPlan, sink: Box<dyn Sink>) -> Self {
        Self {
            client,
            plan,
            sink,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[async_trait]
impl<S> Job for PollJob<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn run(&mut self) -> Result<()> {
        let sample = self.plan.poll(&mut self.client).await?;
        self.cycles += 1;

        // a broken output should not stop us collecting
        if let Err(e) = self.sink.deliver(&sample).await {
            error!("failed to deliver sample {}: {:#}", sample.utc(), e);
        }

        Ok(())
    }
}
// }}}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_operations_resolve() {
        let plan = PollPlan::new(DEFAULT_OPERATIONS).unwrap();
        assert_eq!(plan.len(), 20);
    }

    #[test]
    fn unknown_name_is_reported() {
        match PollPlan::new(&["gridPowerAll", "gridPowerAl"]) {
            Err(Error::UnknownOperation(name)) => assert_eq!(name, "gridPowerAl"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sample_serializes_in_poll_order() {
        let utc = Utc.with_ymd_and_hms(2015, 6, 1, 10, 0, 0).unwrap();
        let sample = Sample::new(
            utc,
            vec![
                ("weeklyEnergy", Value::Integer(1200)),
                ("boosterTemp", Value::Float(41.5)),
                ("getTime", Value::Date(NaiveDate::from_ymd_opt(2015, 6, 1).unwrap())),
            ],
        );

        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"utc":"2015-06-01T10:00:00Z","weeklyEnergy":1200,"boosterTemp":41.5,"getTime":"2015-06-01"}"#
        );
    }
}
