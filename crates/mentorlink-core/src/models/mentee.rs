use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Pending,
    Rejected,
    Completed,
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingStatus::Pending => write!(f, "Pending"),
            MeetingStatus::Rejected => write!(f, "Rejected"),
            MeetingStatus::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    #[serde(rename = "menteeId")]
    pub mentee_id: String,
    #[serde(rename = "dateTime")]
    pub date_time: String,
    pub status: MeetingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMeeting {
    #[serde(rename = "menteeId")]
    pub mentee_id: String,
    #[serde(rename = "dateTime")]
    pub date_time: String,
    pub status: MeetingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial update; unset fields are left alone by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MeetingUpdate {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MeetingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrayerRequest {
    pub id: String,
    #[serde(rename = "menteeId")]
    pub mentee_id: String,
    pub request: String,
    #[serde(rename = "dateCreated")]
    pub date_created: String,
    #[serde(rename = "isAnswered", default)]
    pub is_answered: bool,
    #[serde(rename = "dateAnswered", default, skip_serializing_if = "Option::is_none")]
    pub date_answered: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPrayerRequest {
    #[serde(rename = "menteeId")]
    pub mentee_id: String,
    pub request: String,
    #[serde(rename = "dateCreated")]
    pub date_created: String,
    #[serde(rename = "isAnswered")]
    pub is_answered: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrayerRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(rename = "isAnswered", skip_serializing_if = "Option::is_none")]
    pub is_answered: Option<bool>,
    #[serde(rename = "dateAnswered", skip_serializing_if = "Option::is_none")]
    pub date_answered: Option<String>,
}

impl PrayerRequestUpdate {
    /// Mark a request answered as of now.
    pub fn answered() -> Self {
        Self {
            is_answered: Some(true),
            date_answered: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableTimes {
    #[serde(rename = "dayOfWeek", default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(rename = "weekOfMonth", default, skip_serializing_if = "Option::is_none")]
    pub week_of_month: Option<u8>,
    #[serde(rename = "specificDates", default, skip_serializing_if = "Option::is_none")]
    pub specific_dates: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mentee {
    // Empty until the backend assigns one; not sent on create
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "photoUrl", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Desired meeting cadence in days
    #[serde(rename = "preferredFrequency")]
    pub preferred_frequency: u32,
    #[serde(rename = "lastMeetingDate", default, skip_serializing_if = "Option::is_none")]
    pub last_meeting_date: Option<String>,
    #[serde(rename = "nextRecommendedDate", default, skip_serializing_if = "Option::is_none")]
    pub next_recommended_date: Option<String>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(rename = "prayerRequests", default)]
    pub prayer_requests: Vec<PrayerRequest>,
    #[serde(rename = "unavailableTimes", default)]
    pub unavailable_times: UnavailableTimes,
}

impl Mentee {
    pub fn pending_meetings(&self) -> impl Iterator<Item = &Meeting> {
        self.meetings
            .iter()
            .filter(|m| m.status == MeetingStatus::Pending)
    }

    pub fn open_prayer_requests(&self) -> impl Iterator<Item = &PrayerRequest> {
        self.prayer_requests.iter().filter(|p| !p.is_answered)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MenteeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "preferredFrequency", skip_serializing_if = "Option::is_none")]
    pub preferred_frequency: Option<u32>,
    #[serde(rename = "unavailableTimes", skip_serializing_if = "Option::is_none")]
    pub unavailable_times: Option<UnavailableTimes>,
}
