//! Allow-set of call-related AMI events

/// Channel lifecycle
pub const CHANNEL_EVENTS: &[&str] = &[
    "Newchannel",
    "Hangup",
    "NewCallerid",
    "NewAccountCode",
    "NewExten",
    "NewState",
    "VarSet",
    "ChannelTalkingStart",
    "ChannelTalkingStop",
    "OriginateResponse",
];

/// Dialing
pub const DIAL_EVENTS: &[&str] = &["DialBegin", "DialEnd", "Dial"];

/// Bridging, including local channel optimization
pub const BRIDGE_EVENTS: &[&str] = &[
    "Bridge",
    "Unbridge",
    "BridgeCreate",
    "BridgeDestroy",
    "BridgeEnter",
    "BridgeLeave",
    "LocalBridge",
    "LocalOptimizationBegin",
    "LocalOptimizationEnd",
];

/// Queues and agents
pub const QUEUE_EVENTS: &[&str] = &[
    "AgentCalled",
    "AgentConnect",
    "QueueMemberAdded",
    "QueueMemberRemoved",
];

/// Hold and transfer
pub const HOLD_TRANSFER_EVENTS: &[&str] = &[
    "Hold",
    "Unhold",
    "MusicOnHoldStart",
    "MusicOnHoldStop",
    "Transfer",
    "AttendedTransfer",
    "BlindTransfer",
];

/// Keypad
pub const DTMF_EVENTS: &[&str] = &["DTMF"];

/// Registration and presence
pub const PRESENCE_EVENTS: &[&str] = &["Registry", "PeerStatus", "ContactStatus"];

/// Voicemail
pub const VOICEMAIL_EVENTS: &[&str] = &["VoicemailUserEntry"];

/// Call-detail records
pub const RECORD_EVENTS: &[&str] = &["CEL", "CDR"];

/// Dialplan-defined events
pub const USER_EVENTS: &[&str] = &["UserEvent"];

/// Every category of the allow-set
pub const CATEGORIES: &[&[&str]] = &[
    CHANNEL_EVENTS,
    DIAL_EVENTS,
    BRIDGE_EVENTS,
    QUEUE_EVENTS,
    HOLD_TRANSFER_EVENTS,
    DTMF_EVENTS,
    PRESENCE_EVENTS,
    VOICEMAIL_EVENTS,
    RECORD_EVENTS,
    USER_EVENTS,
];

/// Whether an AMI event type is forwarded
///
/// Matching is exact and case-sensitive.
pub fn should_forward(event_type: &str) -> bool {
    CATEGORIES
        .iter()
        .any(|category| category.iter().any(|member| *member == event_type))
}
