mod common;
use common::*;
use aurora_bridge::command::{Decoder, Direct, DspChannel, Energy, EnergyWindow, Formatter, Opcode};
use aurora_bridge::prelude::*;

#[test]
fn lookup_by_name() -> Result<()> {
    common_setup();

    assert_eq!(Operation::lookup("gridPowerAll")?, Operation::Dsp(DspChannel::GridPowerAll));
    assert_eq!(Operation::from_str("boosterTemp")?, Operation::Dsp(DspChannel::BoosterTemp));
    assert_eq!(
        Operation::lookup("weeklyEnergy")?,
        Operation::Energy(Energy::Cumulated(EnergyWindow::Weekly))
    );
    assert_eq!(Operation::lookup("getTime")?, Operation::Direct(Direct::Time));

    Ok(())
}

#[test]
fn lookup_is_exact() {
    for name in ["GridPowerAll", "gridPowerAll ", "", "nope"] {
        match Operation::lookup(name) {
            Err(Error::UnknownOperation(n)) => assert_eq!(n, name),
            r => panic!("{:?} resolved to {:?}", name, r),
        }
    }
}

#[test]
fn command_bytes() -> Result<()> {
    let op = Operation::lookup("gridPowerAll")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (59, Some(3)));

    let op = Operation::lookup("rIsoRes")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (59, Some(30)));

    let op = Operation::lookup("fan7SpeedRpm")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (59, Some(101)));

    let op = Operation::lookup("dailyEnergy")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (78, Some(0)));

    let op = Operation::lookup("partialEnergy")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (78, Some(6)));

    let op = Operation::lookup("getEnergy10")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (76, Some(2)));

    let op = Operation::lookup("getSerial")?;
    assert_eq!((op.opcode(), op.sub_opcode()), (u8::from(Opcode::GetSerial), None));

    Ok(())
}

#[test]
fn decoders_and_formats() -> Result<()> {
    let op = Operation::lookup("gridPowerAll")?;
    assert_eq!(op.decoder(), Decoder::Float32);
    assert_eq!(op.formatter(), Formatter::Fixed2);

    let value = op.decode(&Factory::body(1234.5f32.to_be_bytes()))?;
    assert_eq!(value, Value::Float(1234.5));
    assert_eq!(op.format(&value), " 1234.50");

    let op = Operation::lookup("totalEnergy")?;
    assert_eq!(op.decoder(), Decoder::Int32);
    assert_eq!(op.decode(&Factory::body(4_321_000i32.to_be_bytes()))?, Value::Integer(4_321_000));

    let op = Operation::lookup("getPartNumber")?;
    assert_eq!(op.decoder(), Decoder::Ascii);
    assert_eq!(op.decode(b"-3G79-")?, Value::Text("-3G79-".to_string()));

    let op = Operation::lookup("getFirmwareRel")?;
    assert_eq!(op.decoder(), Decoder::Text);
    assert_eq!(op.formatter(), Formatter::Plain);

    Ok(())
}

#[test]
fn every_operation_has_a_frame() {
    assert!(Operation::all().count() > 70);
    for op in Operation::all() {
        assert_eq!(op.to_string(), op.name());
        assert_eq!(Operation::lookup(op.name()).unwrap(), op);
    }
}

#[test]
fn generic_channel_names_still_resolve() -> Result<()> {
    let op = Operation::lookup("ToM39")?;
    assert_eq!(op, Operation::Dsp(DspChannel::GridCurrentPhaseR));
    assert_eq!((op.opcode(), op.sub_opcode()), (59, Some(39)));

    for (alias, sub) in [("ToM38", 38), ("ToM46", 46), ("ToM50", 50), ("ToM63", 63), ("ToM95", 95), ("ToM101", 101)] {
        assert_eq!(Operation::lookup(alias)?.sub_opcode(), Some(sub), "{}", alias);
    }

    // only the channels that never had a descriptive name
    assert!(Operation::lookup("ToM3").is_err());
    assert!(Operation::lookup("ToM47").is_err());
    assert!(PollPlan::new(&["ToM39", "gridPowerAll"]).is_ok());

    Ok(())
}
