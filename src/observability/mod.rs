//! Turn telemetry.
//!
//! An explicit counter object, created by the caller and passed into the
//! orchestrator — never a process-wide singleton. Event categories mirror
//! the branches of the turn state machine so a test (or an operator
//! reading logs) can see exactly which path a turn took.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    PrimaryCall,
    FollowUpCall,
    ToolUseFailure,
    RecoveredToolCall,
    RepairRetry,
    ToolExecuted,
    ToolFailed,
    RateLimited,
    ApiError,
    TransportError,
    Answered,
    Errored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnCounters {
    pub primary_calls: u32,
    pub follow_up_calls: u32,
    pub tool_use_failures: u32,
    pub recovered_tool_calls: u32,
    pub repair_retries: u32,
    pub tools_executed: u32,
    pub tools_failed: u32,
    pub rate_limited: u32,
    pub api_errors: u32,
    pub transport_errors: u32,
    pub answered: u32,
    pub errored: u32,
}

impl TurnCounters {
    pub fn record(&mut self, event: TurnEvent) {
        let slot = match event {
            TurnEvent::PrimaryCall => &mut self.primary_calls,
            TurnEvent::FollowUpCall => &mut self.follow_up_calls,
            TurnEvent::ToolUseFailure => &mut self.tool_use_failures,
            TurnEvent::RecoveredToolCall => &mut self.recovered_tool_calls,
            TurnEvent::RepairRetry => &mut self.repair_retries,
            TurnEvent::ToolExecuted => &mut self.tools_executed,
            TurnEvent::ToolFailed => &mut self.tools_failed,
            TurnEvent::RateLimited => &mut self.rate_limited,
            TurnEvent::ApiError => &mut self.api_errors,
            TurnEvent::TransportError => &mut self.transport_errors,
            TurnEvent::Answered => &mut self.answered,
            TurnEvent::Errored => &mut self.errored,
        };
        *slot += 1;
    }

    /// Every turn ends in exactly one terminal; useful as a test invariant.
    pub fn terminals(&self) -> u32 {
        self.answered + self.errored
    }
}
