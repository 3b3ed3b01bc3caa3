//! Backend profiles
//!
//! A profile is a concrete protocol revision. It fixes which commands exist,
//! which domains are enabled at handshake, and the few places where request
//! encodings differ between revisions.

use super::codec::ProtocolCommand;
use super::domains::debugger::{DebuggerEnableParams, SetVariableValueParams};
use super::domains::dom::DomEnableParams;
use super::domains::page::PageEnableParams;
use super::domains::runtime::{GetPropertiesParams, RuntimeEnableParams};
use super::ids::RemoteObjectId;
use phf::phf_set;
use serde::Deserialize;
use std::str::FromStr;

/// Commands understood by the WebKit trunk revision
static DEV_COMMANDS: phf::Set<&'static str> = phf_set! {
    "Debugger.enable",
    "Debugger.disable",
    "Debugger.pause",
    "Debugger.resume",
    "Debugger.stepOver",
    "Debugger.stepInto",
    "Debugger.stepOut",
    "Debugger.setBreakpointByUrl",
    "Debugger.setBreakpoint",
    "Debugger.removeBreakpoint",
    "Debugger.setBreakpointsActive",
    "Debugger.setPauseOnExceptions",
    "Debugger.getScriptSource",
    "Debugger.evaluateOnCallFrame",
    "Debugger.getFunctionDetails",
    "Debugger.setVariableValue",
    "Runtime.enable",
    "Runtime.evaluate",
    "Runtime.getProperties",
    "Runtime.releaseObject",
    "Runtime.releaseObjectGroup",
    "Page.enable",
    "Page.getResourceTree",
    "Page.reload",
    "DOM.enable",
    "DOM.getDocument",
};

/// Commands understood by protocol 1.0
static PROTOCOL_1_0_COMMANDS: phf::Set<&'static str> = phf_set! {
    "Debugger.enable",
    "Debugger.disable",
    "Debugger.pause",
    "Debugger.resume",
    "Debugger.stepOver",
    "Debugger.stepInto",
    "Debugger.stepOut",
    "Debugger.setBreakpointByUrl",
    "Debugger.setBreakpoint",
    "Debugger.removeBreakpoint",
    "Debugger.setBreakpointsActive",
    "Debugger.setPauseOnExceptions",
    "Debugger.getScriptSource",
    "Debugger.evaluateOnCallFrame",
    "Debugger.getFunctionDetails",
    "Runtime.evaluate",
    "Runtime.getProperties",
    "Runtime.releaseObject",
    "Runtime.releaseObjectGroup",
    "Page.enable",
    "Page.getResourceTree",
    "Page.reload",
};

const DEV_HANDSHAKE: &[&str] = &[
    DebuggerEnableParams::METHOD,
    RuntimeEnableParams::METHOD,
    PageEnableParams::METHOD,
    DomEnableParams::METHOD,
];

// Runtime.enable does not exist in 1.0; Runtime is always on there.
const PROTOCOL_1_0_HANDSHAKE: &[&str] = &[DebuggerEnableParams::METHOD, PageEnableParams::METHOD];

/// Concrete protocol revision spoken by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendProfile {
    /// WebKit trunk
    Dev,
    /// Protocol 1.0
    Protocol10,
}

impl BackendProfile {
    /// Pick a profile from the `Protocol-Version` the browser reports
    pub fn detect(protocol_version: &str) -> Self {
        match protocol_version.trim() {
            "1.0" => BackendProfile::Protocol10,
            _ => BackendProfile::Dev,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendProfile::Dev => "dev",
            BackendProfile::Protocol10 => "1.0",
        }
    }

    fn commands(&self) -> &'static phf::Set<&'static str> {
        match self {
            BackendProfile::Dev => &DEV_COMMANDS,
            BackendProfile::Protocol10 => &PROTOCOL_1_0_COMMANDS,
        }
    }

    /// Whether the backend understands `method`
    pub fn supports(&self, method: &str) -> bool {
        self.commands().contains(method)
    }

    /// Domain-enable commands issued at handshake, in order
    pub fn handshake_commands(&self) -> &'static [&'static str] {
        match self {
            BackendProfile::Dev => DEV_HANDSHAKE,
            BackendProfile::Protocol10 => PROTOCOL_1_0_HANDSHAKE,
        }
    }

    /// Whether scope variables can be assigned
    pub fn supports_value_modification(&self) -> bool {
        self.supports(SetVariableValueParams::METHOD)
    }

    /// Whether `Runtime.getProperties` replies carry `internalProperties`
    pub fn reports_internal_properties(&self) -> bool {
        matches!(self, BackendProfile::Dev)
    }

    /// Encode a property fetch for this revision
    pub fn get_properties(&self, object_id: RemoteObjectId) -> GetPropertiesParams {
        let params = GetPropertiesParams::new(object_id).with_own_properties(true);
        match self {
            BackendProfile::Dev => params.with_accessor_properties_only(false),
            BackendProfile::Protocol10 => params,
        }
    }
}

impl std::fmt::Display for BackendProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configured profile choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ProfileSelection {
    /// Ask the browser for its protocol version
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "dev")]
    Dev,
    #[serde(rename = "1.0")]
    Protocol10,
}

impl ProfileSelection {
    /// Resolve against the version the browser reported
    pub fn resolve(&self, protocol_version: Option<&str>) -> BackendProfile {
        match self {
            ProfileSelection::Dev => BackendProfile::Dev,
            ProfileSelection::Protocol10 => BackendProfile::Protocol10,
            ProfileSelection::Auto => protocol_version
                .map(BackendProfile::detect)
                .unwrap_or(BackendProfile::Dev),
        }
    }
}

impl FromStr for ProfileSelection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ProfileSelection::Auto),
            "dev" => Ok(ProfileSelection::Dev),
            "1.0" => Ok(ProfileSelection::Protocol10),
            other => Err(crate::Error::configuration(format!(
                "Unknown backend profile: {}",
                other
            ))),
        }
    }
}
