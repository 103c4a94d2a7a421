use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub cover_url: String,
    pub media_urls: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub credits: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Caller-supplied media item, missing the fields the store assigns.
#[derive(Deserialize, Debug, Clone)]
pub struct MediaDraft {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub cover_url: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub credits: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Member {
    pub id: String,
    pub username: String,
    /// Compared by exact match, this is not a digest.
    pub password_hash: String,
    #[serde(default)]
    pub default_credit_name: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MemberDraft {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub default_credit_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub instagram_handle: Option<String>,
}

/// Member as shown to callers outside the store: no credential.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MemberView {
    pub id: String,
    pub username: String,
    pub default_credit_name: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Member> for MemberView {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            username: member.username,
            default_credit_name: member.default_credit_name,
            role: member.role,
            instagram_handle: member.instagram_handle,
            created_at: member.created_at,
        }
    }
}

/// The complete, versioned state of the catalog and the directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub media_items: Vec<MediaItem>,
    #[serde(default)]
    pub members: Vec<Member>,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

/// Snapshot as exported over HTTP: members carry no credential.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SnapshotView {
    pub media_items: Vec<MediaItem>,
    pub members: Vec<MemberView>,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl From<Snapshot> for SnapshotView {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            media_items: snapshot.media_items,
            members: snapshot.members.into_iter().map(MemberView::from).collect(),
            version: snapshot.version,
            last_updated: snapshot.last_updated,
        }
    }
}

impl Snapshot {
    /// Stamps `last_updated` and bumps `version`. Called once per save attempt.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
        self.version += 1;
    }

    /// Built-in content used when no backend has anything saved.
    pub fn builtin(admin_password: &str) -> Self {
        let now = Utc::now();
        let portrait =
            "https://images.unsplash.com/photo-1649972904349-6e44c42644a7?w=800&h=600&fit=crop";

        Self {
            version: 1,
            last_updated: now,
            media_items: vec![
                MediaItem {
                    id: "photo-1".to_string(),
                    media_type: MediaType::Photo,
                    cover_url: portrait.to_string(),
                    media_urls: vec![
                        portrait.to_string(),
                        "https://images.unsplash.com/photo-1488590528505-98d2b5aba04b?w=800&h=600&fit=crop"
                            .to_string(),
                    ],
                    description: "Professional portrait session".to_string(),
                    credits: vec!["Emma Martinez".to_string(), "Michael Chen".to_string()],
                    uploaded_at: now,
                },
                MediaItem {
                    id: "video-1".to_string(),
                    media_type: MediaType::Video,
                    cover_url:
                        "https://images.unsplash.com/photo-1574717024653-61fd2cf4d44d?w=800&h=600&fit=crop"
                            .to_string(),
                    media_urls: vec![
                        "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4"
                            .to_string(),
                    ],
                    description: "Creative video showcase".to_string(),
                    credits: vec!["Sarah Johnson".to_string()],
                    uploaded_at: now,
                },
            ],
            members: vec![Member {
                id: "admin-1".to_string(),
                username: "admin".to_string(),
                password_hash: admin_password.to_string(),
                default_credit_name: Some("Admin".to_string()),
                role: Role::Admin,
                instagram_handle: None,
                created_at: now,
            }],
        }
    }
}

/// Generates `<prefix>_<unix millis>_<9 random chars>`.
///
/// The random suffix keeps ids distinct when two records are created within
/// the same millisecond.
pub fn generate_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, millis, &suffix[..9])
}

impl MediaDraft {
    pub fn materialize(self) -> MediaItem {
        let media_urls = if self.media_urls.is_empty() {
            vec![self.cover_url.clone()]
        } else {
            self.media_urls
        };

        MediaItem {
            id: generate_id("media"),
            media_type: self.media_type,
            cover_url: self.cover_url,
            media_urls,
            description: self.description,
            credits: self.credits,
            uploaded_at: Utc::now(),
        }
    }
}

impl MemberDraft {
    pub fn materialize(self) -> Member {
        Member {
            id: generate_id("member"),
            username: self.username,
            password_hash: self.password_hash,
            default_credit_name: self.default_credit_name,
            role: self.role,
            instagram_handle: self.instagram_handle,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn touch_bumps_version_and_stamp() {
        let mut snapshot = Snapshot::builtin("admin");
        let before = snapshot.last_updated;
        snapshot.touch();
        snapshot.touch();
        assert_eq!(snapshot.version, 3);
        assert!(snapshot.last_updated >= before);
    }

    #[test]
    fn builtin_has_two_media_items_and_an_admin() {
        let snapshot = Snapshot::builtin("team23");
        let ids: Vec<_> = snapshot.media_items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["photo-1", "video-1"]);
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.members[0].role, Role::Admin);
        assert_eq!(snapshot.members[0].password_hash, "team23");
    }

    #[test]
    fn generated_ids_are_distinct_within_a_millisecond() {
        let ids: HashSet<_> = (0..500).map(|_| generate_id("media")).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| id.starts_with("media_")));
    }

    #[test]
    fn empty_media_urls_default_to_cover() {
        let item = MediaDraft {
            media_type: MediaType::Photo,
            cover_url: "https://x/1.jpg".to_string(),
            media_urls: vec![],
            description: "d".to_string(),
            credits: vec![],
        }
        .materialize();
        assert_eq!(item.media_urls, vec!["https://x/1.jpg".to_string()]);
    }

    #[test]
    fn snapshot_json_uses_wire_names() {
        let snapshot = Snapshot::builtin("admin");
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["media_items"][0]["type"], "photo");
        assert_eq!(value["members"][0]["role"], "admin");
        assert!(value["members"][0].get("instagram_handle").is_none());

        let parsed: Snapshot = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
