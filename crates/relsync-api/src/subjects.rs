//! Bus subjects the synchronizer handles.

/// Queue group name for load-balanced event subscriptions.
pub const SYNC_QUEUE: &str = "lfx.fga-sync.queue";

// Generic envelope subjects. These are the primary schema; everything
// below them is a backward-compatible resource-specific alias.

/// Generic full-object access updates.
pub const UPDATE_ACCESS: &str = "lfx.fga-sync.update_access";
/// Generic whole-object tuple deletion.
pub const DELETE_ACCESS: &str = "lfx.fga-sync.delete_access";
/// Generic per-user relation put.
pub const MEMBER_PUT: &str = "lfx.fga-sync.member_put";
/// Generic per-user relation removal.
pub const MEMBER_REMOVE: &str = "lfx.fga-sync.member_remove";

/// Batched authorization check requests.
pub const ACCESS_CHECK_REQUEST: &str = "lfx.access_check.request";

// Legacy project subjects.
pub const PROJECT_UPDATE_ACCESS: &str = "lfx.update_access.project";
pub const PROJECT_DELETE_ALL_ACCESS: &str = "lfx.delete_all_access.project";

// Legacy committee subjects.
pub const COMMITTEE_UPDATE_ACCESS: &str = "lfx.update_access.committee";
pub const COMMITTEE_DELETE_ALL_ACCESS: &str = "lfx.delete_all_access.committee";
pub const COMMITTEE_MEMBER_PUT: &str = "lfx.put_member.committee";
pub const COMMITTEE_MEMBER_REMOVE: &str = "lfx.remove_member.committee";

// Legacy meeting subjects.
pub const MEETING_UPDATE_ACCESS: &str = "lfx.update_access.meeting";
pub const MEETING_DELETE_ALL_ACCESS: &str = "lfx.delete_all_access.meeting";
pub const MEETING_REGISTRANT_PUT: &str = "lfx.put_registrant.meeting";
pub const MEETING_REGISTRANT_REMOVE: &str = "lfx.remove_registrant.meeting";
pub const MEETING_ATTACHMENT_UPDATE_ACCESS: &str = "lfx.update_access.meeting_attachment";
pub const MEETING_ATTACHMENT_DELETE_ACCESS: &str = "lfx.delete_access.meeting_attachment";

// Legacy past-meeting subjects.
pub const PAST_MEETING_UPDATE_ACCESS: &str = "lfx.update_access.past_meeting";
pub const PAST_MEETING_DELETE_ALL_ACCESS: &str = "lfx.delete_all_access.past_meeting";
pub const PAST_MEETING_PARTICIPANT_PUT: &str = "lfx.put_participant.past_meeting";
pub const PAST_MEETING_PARTICIPANT_REMOVE: &str = "lfx.remove_participant.past_meeting";

// Legacy past-meeting artifact subjects.
pub const PAST_MEETING_RECORDING_UPDATE_ACCESS: &str = "lfx.update_access.past_meeting_recording";
pub const PAST_MEETING_TRANSCRIPT_UPDATE_ACCESS: &str = "lfx.update_access.past_meeting_transcript";
pub const PAST_MEETING_SUMMARY_UPDATE_ACCESS: &str = "lfx.update_access.past_meeting_summary";

// Legacy groups.io subjects.
pub const GROUPSIO_SERVICE_UPDATE_ACCESS: &str = "lfx.update_access.groupsio_service";
pub const GROUPSIO_SERVICE_DELETE_ALL_ACCESS: &str = "lfx.delete_all_access.groupsio_service";
pub const GROUPSIO_MAILING_LIST_UPDATE_ACCESS: &str = "lfx.update_access.groupsio_mailing_list";
pub const GROUPSIO_MAILING_LIST_DELETE_ALL_ACCESS: &str =
    "lfx.delete_all_access.groupsio_mailing_list";
pub const GROUPSIO_MAILING_LIST_MEMBER_PUT: &str = "lfx.put_member.groupsio_mailing_list";
pub const GROUPSIO_MAILING_LIST_MEMBER_REMOVE: &str = "lfx.remove_member.groupsio_mailing_list";
pub const GROUPSIO_MEMBER_UPDATE_ACCESS: &str = "lfx.update_access.groupsio_member";
pub const GROUPSIO_MEMBER_DELETE_ALL_ACCESS: &str = "lfx.delete_all_access.groupsio_member";

/// Every subject the service subscribes to.
pub const ALL: &[&str] = &[
    UPDATE_ACCESS,
    DELETE_ACCESS,
    MEMBER_PUT,
    MEMBER_REMOVE,
    ACCESS_CHECK_REQUEST,
    PROJECT_UPDATE_ACCESS,
    PROJECT_DELETE_ALL_ACCESS,
    COMMITTEE_UPDATE_ACCESS,
    COMMITTEE_DELETE_ALL_ACCESS,
    COMMITTEE_MEMBER_PUT,
    COMMITTEE_MEMBER_REMOVE,
    MEETING_UPDATE_ACCESS,
    MEETING_DELETE_ALL_ACCESS,
    MEETING_REGISTRANT_PUT,
    MEETING_REGISTRANT_REMOVE,
    MEETING_ATTACHMENT_UPDATE_ACCESS,
    MEETING_ATTACHMENT_DELETE_ACCESS,
    PAST_MEETING_UPDATE_ACCESS,
    PAST_MEETING_DELETE_ALL_ACCESS,
    PAST_MEETING_PARTICIPANT_PUT,
    PAST_MEETING_PARTICIPANT_REMOVE,
    PAST_MEETING_RECORDING_UPDATE_ACCESS,
    PAST_MEETING_TRANSCRIPT_UPDATE_ACCESS,
    PAST_MEETING_SUMMARY_UPDATE_ACCESS,
    GROUPSIO_SERVICE_UPDATE_ACCESS,
    GROUPSIO_SERVICE_DELETE_ALL_ACCESS,
    GROUPSIO_MAILING_LIST_UPDATE_ACCESS,
    GROUPSIO_MAILING_LIST_DELETE_ALL_ACCESS,
    GROUPSIO_MAILING_LIST_MEMBER_PUT,
    GROUPSIO_MAILING_LIST_MEMBER_REMOVE,
    GROUPSIO_MEMBER_UPDATE_ACCESS,
    GROUPSIO_MEMBER_DELETE_ALL_ACCESS,
];
