/// Script-pointer publish topic; payload is the JSON-encoded `Pointer`,
/// always sent with `retain = true`.
pub const TRACKER_POSITION: &str = "local_server/tracker/position";

/// Start/stop command topic; payload is the literal string `"start"` or
/// `"stop"`.
pub const TRACKER_CMD: &str = "local_server/tracker/cmd";
