//! Shared test helpers for integration tests

use argent::frame::{CallsiteId, StaticFrameId};
use argent::heap::ObjRef;
use argent::profile::{LogBuffer, LogEvent};

/// Install the test logger; safe to call from every test
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fluent builder for profile logs in tests
pub struct LogBuilder {
    log: LogBuffer,
}

#[allow(dead_code)]
impl LogBuilder {
    pub fn new() -> Self {
        Self {
            log: LogBuffer::new(),
        }
    }

    pub fn entry(mut self, id: u32, sf: StaticFrameId, cs: Option<CallsiteId>) -> Self {
        self.log.push(LogEvent::Entry { id, sf, cs }).unwrap();
        self
    }

    pub fn parameter(mut self, id: u32, arg_idx: u16, ty: ObjRef, concrete: bool) -> Self {
        self.log
            .push(LogEvent::Parameter {
                id,
                arg_idx,
                ty,
                concrete,
            })
            .unwrap();
        self
    }

    pub fn parameter_decont(mut self, id: u32, arg_idx: u16, ty: ObjRef, concrete: bool) -> Self {
        self.log
            .push(LogEvent::ParameterDecont {
                id,
                arg_idx,
                ty,
                concrete,
            })
            .unwrap();
        self
    }

    pub fn type_seen(mut self, id: u32, bytecode_offset: u32, ty: ObjRef, concrete: bool) -> Self {
        self.log
            .push(LogEvent::Type {
                id,
                bytecode_offset,
                ty,
                concrete,
            })
            .unwrap();
        self
    }

    pub fn invoke(mut self, id: u32, bytecode_offset: u32, value: ObjRef) -> Self {
        self.log
            .push(LogEvent::Invoke {
                id,
                bytecode_offset,
                value,
            })
            .unwrap();
        self
    }

    pub fn osr(mut self, id: u32) -> Self {
        self.log.push(LogEvent::Osr { id }).unwrap();
        self
    }

    pub fn static_value(mut self, id: u32, bytecode_offset: u32, value: ObjRef) -> Self {
        self.log
            .push(LogEvent::StaticValue {
                id,
                bytecode_offset,
                value,
            })
            .unwrap();
        self
    }

    pub fn ret(mut self, id: u32, ty: Option<ObjRef>, concrete: bool) -> Self {
        self.log
            .push(LogEvent::Return {
                id,
                bytecode_offset: 0,
                ty,
                concrete,
            })
            .unwrap();
        self
    }

    pub fn seal(mut self) -> LogBuffer {
        self.log.seal();
        self.log
    }
}
