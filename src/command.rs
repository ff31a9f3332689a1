use crate::prelude::*;
use crate::aurora::packet;

use enum_dispatch::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};

// {{{ Opcode
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum Opcode {
    GetPartNumber = 52,
    GetVersion = 58,
    GetDsp = 59,
    GetSerial = 63,
    GetMfrWeekYear = 65,
    GetTime = 70,
    GetFirmwareRel = 72,
    GetCumEnergy10 = 76,
    GetCumEnergy = 78,
}
// }}}

// {{{ Decoder / Formatter
/// How the body of a reply turns into a [`Value`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decoder {
    Int32,
    Float32,
    /// text from the value offset onwards
    Text,
    /// text over the whole body
    Ascii,
    Date,
}

impl Decoder {
    pub fn decode(self, payload: &[u8]) -> Result<Value, Error> {
        Ok(match self {
            Decoder::Int32 => Value::Integer(packet::decode_i32(payload)?),
            Decoder::Float32 => Value::Float(packet::decode_f32(payload)?),
            Decoder::Text => Value::Text(packet::decode_string(payload)?),
            Decoder::Ascii => Value::Text(packet::decode_ascii(payload)?),
            Decoder::Date => Value::Date(packet::decode_date(payload)?),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Formatter {
    /// right-aligned, two decimals, eight wide
    Fixed2,
    Plain,
}

impl Formatter {
    pub fn format(self, value: &Value) -> String {
        match (self, value.as_f64()) {
            (Formatter::Fixed2, Some(v)) => Utils::fixed2(v),
            _ => value.to_string(),
        }
    }
}
// }}}

#[enum_dispatch]
pub trait OperationCommon {
    fn name(&self) -> &'static str;
    fn opcode(&self) -> u8;
    fn sub_opcode(&self) -> Option<u8>;
    fn decoder(&self) -> Decoder;

    fn formatter(&self) -> Formatter {
        match self.decoder() {
            Decoder::Int32 | Decoder::Float32 => Formatter::Fixed2,
            _ => Formatter::Plain,
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value, Error> {
        self.decoder().decode(payload)
    }

    fn format(&self, value: &Value) -> String {
        self.formatter().format(value)
    }
}

/// Everything that can be polled, keyed by the names used in configuration.
#[enum_dispatch(OperationCommon)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Direct(Direct),
    Dsp(DspChannel),
    Energy(Energy),
}

impl Operation {
    pub fn all() -> impl Iterator<Item = Operation> {
        Direct::ALL
            .iter()
            .copied()
            .map(Operation::from)
            .chain(DspChannel::ALL.iter().copied().map(Operation::from))
            .chain(Energy::ALL.iter().copied().map(Operation::from))
    }

    fn answers_to(&self, name: &str) -> bool {
        match self {
            Operation::Dsp(channel) if channel.alias() == Some(name) => true,
            _ => self.name() == name,
        }
    }

    /// Looks up an operation by its configured name or alias. Exact match only.
    pub fn lookup(name: &str) -> Result<Self, Error> {
        Self::all()
            .find(|op| op.answers_to(name))
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// {{{ Direct
/// Single-opcode queries with no sub-opcode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direct {
    FirmwareRelease,
    Time,
    PartNumber,
    Serial,
    Version,
    ManufactureWeekYear,
}

impl Direct {
    pub const ALL: &'static [Direct] = &[
        Direct::FirmwareRelease,
        Direct::Time,
        Direct::PartNumber,
        Direct::Serial,
        Direct::Version,
        Direct::ManufactureWeekYear,
    ];
}

impl OperationCommon for Direct {
    fn name(&self) -> &'static str {
        match self {
            Direct::FirmwareRelease => "getFirmwareRel",
            Direct::Time => "getTime",
            Direct::PartNumber => "getPartNumber",
            Direct::Serial => "getSerial",
            Direct::Version => "getVersion",
            Direct::ManufactureWeekYear => "getMfrWeekYear",
        }
    }

    fn opcode(&self) -> u8 {
        let op = match self {
            Direct::FirmwareRelease => Opcode::GetFirmwareRel,
            Direct::Time => Opcode::GetTime,
            Direct::PartNumber => Opcode::GetPartNumber,
            Direct::Serial => Opcode::GetSerial,
            Direct::Version => Opcode::GetVersion,
            Direct::ManufactureWeekYear => Opcode::GetMfrWeekYear,
        };
        op.into()
    }

    fn sub_opcode(&self) -> Option<u8> {
        None
    }

    fn decoder(&self) -> Decoder {
        match self {
            Direct::Time => Decoder::Date,
            Direct::PartNumber | Direct::Serial => Decoder::Ascii,
            Direct::FirmwareRelease | Direct::Version | Direct::ManufactureWeekYear => {
                Decoder::Text
            }
        }
    }
}
// }}}

// {{{ DspChannel
macro_rules! dsp_channels {
    ($($variant:ident = $id:literal => $name:literal $(| $alias:literal)?,)*) => {
        /// Sub-opcodes of `GetDsp`. Not every channel exists on every model
        /// (grid-tied, central, 3-phase); asking for a missing one is a
        /// deployment mistake we don't try to detect.
        #[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
        #[repr(u8)]
        pub enum DspChannel {
            $($variant = $id,)*
        }

        impl DspChannel {
            pub const ALL: &'static [DspChannel] = &[$(DspChannel::$variant,)*];

            fn channel_name(self) -> &'static str {
                match self {
                    $(DspChannel::$variant => $name,)*
                }
            }

            /// Older generic name (`ToM<sub-opcode>`) still accepted in
            /// configuration for the central and 3-phase channels.
            pub fn alias(self) -> Option<&'static str> {
                match self {
                    $(DspChannel::$variant => None$(.or(Some($alias)))?,)*
                }
            }
        }
    };
}

dsp_channels! {
    GridVoltageAll = 1 => "gridVoltageAll",
    GridCurrentAll = 2 => "gridCurrentAll",
    GridPowerAll = 3 => "gridPowerAll",
    FrequencyAll = 4 => "frequencyAll",
    VBulk = 5 => "vBulk",
    ILeakDcDc = 6 => "iLeakDcDc",
    ILeakInverter = 7 => "iLeakInverter",
    Pin1All = 8 => "pin1All",
    Pin2All = 9 => "pin2All",
    InverterTemp = 21 => "inverterTemp",
    BoosterTemp = 22 => "boosterTemp",
    In1Voltage = 23 => "in1Voltage",
    In1Current = 25 => "in1Current",
    In2Voltage = 26 => "in2Voltage",
    In2Current = 27 => "in2Current",
    GridVoltageDcDc = 28 => "gridVoltageDcDc",
    GridFrequencyDcDc = 29 => "gridFrequencyDcDc",
    IsolationResistance = 30 => "rIsoRes",
    BulkVoltageDcDc = 31 => "bulkVoltageDcDc",
    GridVoltageAverage = 32 => "gridVoltageAverage",
    BulkVoltageMid = 33 => "bulkVoltageMid",
    PowerPeakAll = 34 => "powerPeakAll",
    PowerPeakToday = 35 => "powerPeakToday",
    GridVoltageNeutral = 36 => "gridVoltageNeutral",
    WindGeneratorFrequency = 37 => "windGeneratorFrequency",
    GridVoltageNeutralPhase = 38 => "gridVoltageNeutralPhase" | "ToM38",
    GridCurrentPhaseR = 39 => "gridCurrentPhaseR" | "ToM39",
    GridCurrentPhaseS = 40 => "gridCurrentPhaseS" | "ToM40",
    GridCurrentPhaseT = 41 => "gridCurrentPhaseT" | "ToM41",
    FrequencyPhaseR = 42 => "frequencyPhaseR" | "ToM42",
    FrequencyPhaseS = 43 => "frequencyPhaseS" | "ToM43",
    FrequencyPhaseT = 44 => "frequencyPhaseT" | "ToM44",
    BulkVoltagePositive = 45 => "bulkVoltagePositive" | "ToM45",
    BulkVoltageNegative = 46 => "bulkVoltageNegative" | "ToM46",
    SupervisorTemp = 47 => "supervisorTemp",
    AlimTemp = 48 => "alimTemp",
    HeatsinkTemp = 49 => "heatsinkTemp",
    Temp1 = 50 => "temp1" | "ToM50",
    Temp2 = 51 => "temp2" | "ToM51",
    Temp3 = 52 => "temp3" | "ToM52",
    Fan1Speed = 53 => "fan1Speed" | "ToM53",
    Fan2Speed = 54 => "fan2Speed" | "ToM54",
    Fan3Speed = 55 => "fan3Speed" | "ToM55",
    Fan4Speed = 56 => "fan4Speed" | "ToM56",
    Fan5Speed = 57 => "fan5Speed" | "ToM57",
    PowerSaturationLimit = 58 => "powerSaturationLimit" | "ToM58",
    ReferenceRingBulk = 59 => "referenceRingBulk" | "ToM59",
    VPanelMicro = 60 => "vPanelMicro" | "ToM60",
    GridVoltagePhaseR = 61 => "gridVoltagePhaseR" | "ToM61",
    GridVoltagePhaseS = 62 => "gridVoltagePhaseS" | "ToM62",
    GridVoltagePhaseT = 63 => "gridVoltagePhaseT" | "ToM63",
    Fan1SpeedRpm = 95 => "fan1SpeedRpm" | "ToM95",
    Fan2SpeedRpm = 96 => "fan2SpeedRpm" | "ToM96",
    Fan3SpeedRpm = 97 => "fan3SpeedRpm" | "ToM97",
    Fan4SpeedRpm = 98 => "fan4SpeedRpm" | "ToM98",
    Fan5SpeedRpm = 99 => "fan5SpeedRpm" | "ToM99",
    Fan6SpeedRpm = 100 => "fan6SpeedRpm" | "ToM100",
    Fan7SpeedRpm = 101 => "fan7SpeedRpm" | "ToM101",
}

impl OperationCommon for DspChannel {
    fn name(&self) -> &'static str {
        self.channel_name()
    }

    fn opcode(&self) -> u8 {
        Opcode::GetDsp.into()
    }

    fn sub_opcode(&self) -> Option<u8> {
        Some((*self).into())
    }

    fn decoder(&self) -> Decoder {
        Decoder::Float32
    }
}
// }}}

// {{{ Energy
/// Selector byte of `GetCumEnergy`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(u8)]
pub enum EnergyWindow {
    Daily = 0,
    Weekly = 1,
    Last7Days = 2,
    Monthly = 3,
    Yearly = 4,
    Total = 5,
    Partial = 6, // since last reset
}

/// Cumulated energy counters. The 10-second counter lives under its own
/// opcode with a fixed selector of 2.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Energy {
    Cumulated(EnergyWindow),
    Last10Seconds,
}

impl Energy {
    pub const ALL: &'static [Energy] = &[
        Energy::Cumulated(EnergyWindow::Daily),
        Energy::Cumulated(EnergyWindow::Weekly),
        Energy::Cumulated(EnergyWindow::Last7Days),
        Energy::Cumulated(EnergyWindow::Monthly),
        Energy::Cumulated(EnergyWindow::Yearly),
        Energy::Cumulated(EnergyWindow::Total),
        Energy::Cumulated(EnergyWindow::Partial),
        Energy::Last10Seconds,
    ];
}

impl OperationCommon for Energy {
    fn name(&self) -> &'static str {
        use EnergyWindow::*;

        match self {
            Energy::Cumulated(Daily) => "dailyEnergy",
            Energy::Cumulated(Weekly) => "weeklyEnergy",
            Energy::Cumulated(Last7Days) => "last7Energy",
            Energy::Cumulated(Monthly) => "monthlyEnergy",
            Energy::Cumulated(Yearly) => "yearlyEnergy",
            Energy::Cumulated(Total) => "totalEnergy",
            Energy::Cumulated(Partial) => "partialEnergy",
            Energy::Last10Seconds => "getEnergy10",
        }
    }

    fn opcode(&self) -> u8 {
        match self {
            Energy::Cumulated(_) => Opcode::GetCumEnergy.into(),
            Energy::Last10Seconds => Opcode::GetCumEnergy10.into(),
        }
    }

    fn sub_opcode(&self) -> Option<u8> {
        match self {
            Energy::Cumulated(window) => Some((*window).into()),
            Energy::Last10Seconds => Some(2),
        }
    }

    fn decoder(&self) -> Decoder {
        Decoder::Int32
    }
}
// }}}
