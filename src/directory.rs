use crate::models::{Member, MemberDraft};
use crate::store::StoreFacade;

/// Members in the live snapshot.
pub struct DirectoryStore<'a> {
    store: &'a StoreFacade,
}

impl<'a> DirectoryStore<'a> {
    pub(crate) fn new(store: &'a StoreFacade) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Vec<Member> {
        self.store.read(|s| s.members.clone()).await
    }

    /// Appends a new member and saves. Usernames are not checked for
    /// uniqueness; `authenticate` matches the earliest entry.
    pub async fn insert(&self, draft: MemberDraft) -> Member {
        let member = draft.materialize();
        self.store
            .mutate(|s| {
                s.members.push(member.clone());
                true
            })
            .await;
        tracing::info!(member_id = %member.id, username = %member.username, "Member added");
        member
    }

    /// First member whose username and password both match exactly.
    /// Never saves.
    pub async fn authenticate(&self, username: &str, password: &str) -> Option<Member> {
        let found = self
            .store
            .read(|s| {
                s.members
                    .iter()
                    .find(|m| m.username == username && m.password_hash == password)
                    .cloned()
            })
            .await;

        tracing::info!(%username, success = found.is_some(), "Authentication attempt");
        found
    }
}
