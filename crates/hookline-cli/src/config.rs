use hookline_debugger::Action;

/// Configuration of a tracing session.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct RunConfig {
    /// Breakpoints to install before the program starts.
    #[knus(children(name = "breakpoint"))]
    pub breakpoints: Vec<BreakpointConfig>,
}

/// Configuration of a breakpoint.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct BreakpointConfig {
    /// Location of the breakpoint (`file.c:line`, `file.c:function` or
    /// address).
    #[knus(argument)]
    pub location: String,

    /// What to do once the breakpoint is hit.
    #[knus(property, default)]
    pub action: HitAction,

    /// Whether to report the registers on each hit.
    #[knus(child)]
    pub registers: bool,
}

/// What to do once a breakpoint is hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, knus::DecodeScalar)]
pub enum HitAction {
    /// Report the hit and resume the program.
    #[default]
    Continue,

    /// Report the hit and kill the program.
    Abort,
}

impl From<HitAction> for Action {
    fn from(action: HitAction) -> Self {
        match action {
            HitAction::Continue => Self::Continue,
            HitAction::Abort => Self::Abort,
        }
    }
}
