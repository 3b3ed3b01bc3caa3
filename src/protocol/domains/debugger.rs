//! Debugger domain: scripts, breakpoints, call frames, stepping

use super::runtime::{CallArgument, RemoteObjectValue};
use crate::protocol::codec::{
    empty_command, json_view, protocol_enum, EmptyValue, JsonList, ProtocolCommand,
};
use crate::protocol::ids::{BreakpointId, CallFrameId, RemoteObjectId, ScriptId};
use serde::Serialize;

/// Event names
pub mod events {
    pub const SCRIPT_PARSED: &str = "Debugger.scriptParsed";
    pub const SCRIPT_FAILED_TO_PARSE: &str = "Debugger.scriptFailedToParse";
    pub const BREAKPOINT_RESOLVED: &str = "Debugger.breakpointResolved";
    pub const PAUSED: &str = "Debugger.paused";
    pub const RESUMED: &str = "Debugger.resumed";
    pub const GLOBAL_OBJECT_CLEARED: &str = "Debugger.globalObjectCleared";
}

protocol_enum! {
    /// Scope type
    pub enum ScopeType {
        Global = "global",
        Local = "local",
        With = "with",
        Closure = "closure",
        Catch = "catch",
    }
}

protocol_enum! {
    /// Pause reason
    pub enum PausedReason {
        Xhr = "XHR",
        Dom = "DOM",
        EventListener = "EventListener",
        Exception = "exception",
        Assert = "assert",
        CspViolation = "CSPViolation",
        DebugCommand = "debugCommand",
        PromiseRejection = "promiseRejection",
        Ambiguous = "ambiguous",
        Other = "other",
    }
}

protocol_enum! {
    /// Pause on exceptions mode
    pub enum PauseOnExceptionsState {
        None = "none",
        Uncaught = "uncaught",
        All = "all",
    }
}

json_view! {
    /// Location in the source code.
    pub struct LocationValue<'a> {
        required script_id: ScriptId = "scriptId";
        /// Line number in the script (0-based)
        required line_number: i64 = "lineNumber";
        /// Column number in the script (0-based)
        optional column_number: i64 = "columnNumber";
    }
}

json_view! {
    /// Scope description.
    pub struct ScopeValue<'a> {
        required scope_type: ScopeType = "type";
        /// Object representing the scope; its properties are the scope's variables
        required object: RemoteObjectValue<'a> = "object";
    }
}

json_view! {
    /// JavaScript call frame. Array of call frames form the call stack.
    pub struct CallFrameValue<'a> {
        required call_frame_id: CallFrameId = "callFrameId";
        required function_name: &'a str = "functionName";
        required location: LocationValue<'a> = "location";
        required scope_chain: JsonList<'a, ScopeValue<'a>> = "scopeChain";
        required this_object: RemoteObjectValue<'a> = "this";
    }
}

json_view! {
    /// Information about the function.
    pub struct FunctionDetailsValue<'a> {
        required location: LocationValue<'a> = "location";
        optional name: &'a str = "name";
        optional display_name: &'a str = "displayName";
        optional inferred_name: &'a str = "inferredName";
    }
}

json_view! {
    /// Fired when virtual machine parses script.
    pub struct ScriptParsedEventData<'a> {
        required script_id: ScriptId = "scriptId";
        required url: &'a str = "url";
        required start_line: i64 = "startLine";
        required start_column: i64 = "startColumn";
        required end_line: i64 = "endLine";
        required end_column: i64 = "endColumn";
        optional is_content_script: bool = "isContentScript";
        optional source_map_url: &'a str = "sourceMapURL";
    }
}

json_view! {
    /// Fired when breakpoint is resolved to an actual script and location.
    pub struct BreakpointResolvedEventData<'a> {
        required breakpoint_id: BreakpointId = "breakpointId";
        required location: LocationValue<'a> = "location";
    }
}

json_view! {
    /// Fired when the virtual machine stopped on breakpoint or exception or any other stop criteria.
    pub struct PausedEventData<'a> {
        required call_frames: JsonList<'a, CallFrameValue<'a>> = "callFrames";
        required reason: PausedReason = "reason";
        /// Exception object when `reason` is `exception`
        optional data: RemoteObjectValue<'a> = "data";
        optional hit_breakpoints: JsonList<'a, &'a str> = "hitBreakpoints";
    }
}

json_view! {
    pub struct SetBreakpointByUrlData<'a> {
        required breakpoint_id: BreakpointId = "breakpointId";
        required locations: JsonList<'a, LocationValue<'a>> = "locations";
    }
}

json_view! {
    pub struct SetBreakpointData<'a> {
        required breakpoint_id: BreakpointId = "breakpointId";
        required actual_location: LocationValue<'a> = "actualLocation";
    }
}

json_view! {
    pub struct GetScriptSourceData<'a> {
        required script_source: &'a str = "scriptSource";
    }
}

json_view! {
    /// Evaluates expression on a given call frame.
    pub struct EvaluateOnCallFrameData<'a> {
        /// Object wrapper for the evaluation result
        required result: RemoteObjectValue<'a> = "result";
        /// True if the result was thrown during the evaluation
        optional was_thrown: bool = "wasThrown";
    }
}

json_view! {
    pub struct GetFunctionDetailsData<'a> {
        required details: FunctionDetailsValue<'a> = "details";
    }
}

empty_command! {
    /// Enables debugger for the given page.
    DebuggerEnableParams = "Debugger.enable"
}

empty_command! {
    /// Stops on the next JavaScript statement.
    PauseParams = "Debugger.pause"
}

empty_command! {
    /// Resumes JavaScript execution.
    ResumeParams = "Debugger.resume"
}

empty_command! {
    /// Steps over the statement.
    StepOverParams = "Debugger.stepOver"
}

empty_command! {
    /// Steps into the function call.
    StepIntoParams = "Debugger.stepInto"
}

empty_command! {
    /// Steps out of the function call.
    StepOutParams = "Debugger.stepOut"
}

/// Location written into outgoing commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationParam {
    pub script_id: ScriptId,
    pub line_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,
}

impl LocationParam {
    pub fn new(script_id: ScriptId, line_number: i64) -> Self {
        Self {
            script_id,
            line_number,
            column_number: None,
        }
    }

    pub fn with_column_number(mut self, column_number: i64) -> Self {
        self.column_number = Some(column_number);
        self
    }
}

/// Sets JavaScript breakpoint at given location specified by URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlParams {
    pub line_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl SetBreakpointByUrlParams {
    pub fn new(line_number: i64) -> Self {
        Self {
            line_number,
            url: None,
            url_regex: None,
            column_number: None,
            condition: None,
        }
    }

    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_url_regex<S: Into<String>>(mut self, url_regex: S) -> Self {
        self.url_regex = Some(url_regex.into());
        self
    }

    pub fn with_column_number(mut self, column_number: i64) -> Self {
        self.column_number = Some(column_number);
        self
    }

    pub fn with_condition<S: Into<String>>(mut self, condition: S) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

impl ProtocolCommand for SetBreakpointByUrlParams {
    const METHOD: &'static str = "Debugger.setBreakpointByUrl";
    type Response<'a> = SetBreakpointByUrlData<'a>;
}

/// Sets JavaScript breakpoint at a given script location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointParams {
    pub location: LocationParam,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl SetBreakpointParams {
    pub fn new(location: LocationParam) -> Self {
        Self {
            location,
            condition: None,
        }
    }

    pub fn with_condition<S: Into<String>>(mut self, condition: S) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

impl ProtocolCommand for SetBreakpointParams {
    const METHOD: &'static str = "Debugger.setBreakpoint";
    type Response<'a> = SetBreakpointData<'a>;
}

/// Removes JavaScript breakpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBreakpointParams {
    pub breakpoint_id: BreakpointId,
}

impl RemoveBreakpointParams {
    pub fn new(breakpoint_id: BreakpointId) -> Self {
        Self { breakpoint_id }
    }
}

impl ProtocolCommand for RemoveBreakpointParams {
    const METHOD: &'static str = "Debugger.removeBreakpoint";
    type Response<'a> = EmptyValue<'a>;
}

/// Activates / deactivates all breakpoints on the page.
#[derive(Debug, Clone, Serialize)]
pub struct SetBreakpointsActiveParams {
    pub active: bool,
}

impl ProtocolCommand for SetBreakpointsActiveParams {
    const METHOD: &'static str = "Debugger.setBreakpointsActive";
    type Response<'a> = EmptyValue<'a>;
}

/// Defines pause on exceptions state.
#[derive(Debug, Clone, Serialize)]
pub struct SetPauseOnExceptionsParams {
    pub state: PauseOnExceptionsState,
}

impl ProtocolCommand for SetPauseOnExceptionsParams {
    const METHOD: &'static str = "Debugger.setPauseOnExceptions";
    type Response<'a> = EmptyValue<'a>;
}

/// Returns source for the script with given id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceParams {
    pub script_id: ScriptId,
}

impl ProtocolCommand for GetScriptSourceParams {
    const METHOD: &'static str = "Debugger.getScriptSource";
    type Response<'a> = GetScriptSourceData<'a>;
}

/// Evaluates expression on a given call frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameParams {
    pub call_frame_id: CallFrameId,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    #[serde(rename = "includeCommandLineAPI", skip_serializing_if = "Option::is_none")]
    pub include_command_line_api: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}

impl EvaluateOnCallFrameParams {
    pub fn new<S: Into<String>>(call_frame_id: CallFrameId, expression: S) -> Self {
        Self {
            call_frame_id,
            expression: expression.into(),
            object_group: None,
            include_command_line_api: None,
            return_by_value: None,
        }
    }

    pub fn with_object_group<S: Into<String>>(mut self, group: S) -> Self {
        self.object_group = Some(group.into());
        self
    }

    pub fn with_return_by_value(mut self, return_by_value: bool) -> Self {
        self.return_by_value = Some(return_by_value);
        self
    }

    pub fn with_command_line_api(mut self, include: bool) -> Self {
        self.include_command_line_api = Some(include);
        self
    }
}

impl ProtocolCommand for EvaluateOnCallFrameParams {
    const METHOD: &'static str = "Debugger.evaluateOnCallFrame";
    type Response<'a> = EvaluateOnCallFrameData<'a>;
}

/// Returns detailed information on given function.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFunctionDetailsParams {
    pub function_id: RemoteObjectId,
}

impl ProtocolCommand for GetFunctionDetailsParams {
    const METHOD: &'static str = "Debugger.getFunctionDetails";
    type Response<'a> = GetFunctionDetailsData<'a>;
}

/// Changes value of variable in a callframe or a closure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableValueParams {
    /// 0-based number of scope as was listed in scope chain
    pub scope_number: i64,
    pub variable_name: String,
    pub new_value: CallArgument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_frame_id: Option<CallFrameId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_object_id: Option<RemoteObjectId>,
}

impl SetVariableValueParams {
    pub fn new<S: Into<String>>(scope_number: i64, variable_name: S, new_value: CallArgument) -> Self {
        Self {
            scope_number,
            variable_name: variable_name.into(),
            new_value,
            call_frame_id: None,
            function_object_id: None,
        }
    }

    pub fn with_call_frame_id(mut self, call_frame_id: CallFrameId) -> Self {
        self.call_frame_id = Some(call_frame_id);
        self
    }
}

impl ProtocolCommand for SetVariableValueParams {
    const METHOD: &'static str = "Debugger.setVariableValue";
    type Response<'a> = EmptyValue<'a>;
}
