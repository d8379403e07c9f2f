//! Room creation, membership changes and room listings.

use backchannel_database::util::now_timestamp;
use backchannel_database::{
    DatabaseError, NewRoom, Page, PageRequest, Room, RoomRepository, RoomVisibility,
    UserRepository, UserSummary,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::services::MembershipStore;
use crate::types::{
    ChatError, ChatResult, EventSender, JoinOutcome, LiveEvent, LiveEventKind, MembershipView,
    RoomView,
};
use crate::utils::validation;

pub const DEFAULT_ROOM_PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct RoomManager {
    rooms: RoomRepository,
    users: UserRepository,
    membership: MembershipStore,
    broadcaster: Broadcaster,
}

impl RoomManager {
    pub fn new(pool: SqlitePool, broadcaster: Broadcaster) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            membership: MembershipStore::new(pool),
            broadcaster,
        }
    }

    pub fn membership(&self) -> &MembershipStore {
        &self.membership
    }

    /// Creates a room with its creator as the first admin.
    pub async fn create_room(
        &self,
        name: &str,
        visibility: RoomVisibility,
        creator_id: i64,
    ) -> ChatResult<RoomView> {
        let name = validation::room_name(name)?;
        self.require_user(creator_id).await?;

        let room = self
            .rooms
            .create_with_admin(&NewRoom {
                name,
                visibility,
                created_by: creator_id,
            })
            .await?;

        Ok(room.into())
    }

    /// Public rooms are visible to everyone; private rooms only to members.
    pub async fn get_room(&self, room_id: &str, requester_id: i64) -> ChatResult<RoomView> {
        let room = self.require_room(room_id).await?;

        if !room.visibility.is_public()
            && !self.membership.is_member(requester_id, room.id).await?
        {
            return Err(ChatError::forbidden("not a member of this private room"));
        }

        Ok(room.into())
    }

    /// Adds `user_id` to the room on behalf of `requester_id`.
    ///
    /// Admins may add anyone. Anyone else may only add themselves, and only
    /// to a public room.
    pub async fn add_member(
        &self,
        room_id: &str,
        user_id: i64,
        requester_id: i64,
    ) -> ChatResult<MembershipView> {
        let room = self.require_room(room_id).await?;
        let user = self.require_user(user_id).await?;

        let self_join = requester_id == user_id && room.visibility.is_public();
        if !self_join && !self.membership.is_admin(requester_id, room.id).await? {
            return Err(ChatError::forbidden("only room admins can add members"));
        }

        if self.membership.membership(user_id, room.id).await?.is_some() {
            return Err(ChatError::AlreadyMember { user_id });
        }

        let member = self
            .membership
            .repository()
            .insert(room.id, user_id, false)
            .await
            .map_err(|error| match error {
                DatabaseError::Duplicate(_) => ChatError::AlreadyMember { user_id },
                other => other.into(),
            })?;

        self.announce(&room, &user, LiveEventKind::Join);
        Ok(MembershipView::new(room.public_id, member))
    }

    /// Joins a public room. Joining a room one already belongs to returns
    /// the existing membership.
    pub async fn join_public(&self, room_id: &str, user_id: i64) -> ChatResult<JoinOutcome> {
        let room = self.require_room(room_id).await?;
        if !room.visibility.is_public() {
            return Err(ChatError::forbidden("private rooms require an invitation"));
        }
        let user = self.require_user(user_id).await?;

        let members = self.membership.repository();
        if let Some(existing) = members.find(room.id, user_id).await? {
            return Ok(JoinOutcome {
                membership: MembershipView::new(room.public_id, existing),
                newly_joined: false,
            });
        }

        match members.insert(room.id, user_id, false).await {
            Ok(member) => {
                self.announce(&room, &user, LiveEventKind::Join);
                Ok(JoinOutcome {
                    membership: MembershipView::new(room.public_id, member),
                    newly_joined: true,
                })
            }
            Err(DatabaseError::Duplicate(_)) => {
                // Lost a race with a concurrent join of the same user.
                let existing = members
                    .find(room.id, user_id)
                    .await?
                    .ok_or(ChatError::NotMember { user_id })?;
                Ok(JoinOutcome {
                    membership: MembershipView::new(room.public_id, existing),
                    newly_joined: false,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Removes a member. Admins may remove anyone, members may remove
    /// themselves. The last admin can never be removed.
    pub async fn remove_member(
        &self,
        room_id: &str,
        user_id: i64,
        requester_id: i64,
    ) -> ChatResult<()> {
        let room = self.require_room(room_id).await?;

        if requester_id != user_id && !self.membership.is_admin(requester_id, room.id).await? {
            return Err(ChatError::forbidden("only room admins can remove other members"));
        }

        let members = self.membership.repository();
        if members.find(room.id, user_id).await?.is_none() {
            return Err(ChatError::NotMember { user_id });
        }

        if !members.delete_unless_last_admin(room.id, user_id).await? {
            return match members.find(room.id, user_id).await? {
                Some(_) => Err(ChatError::LastAdmin),
                None => Err(ChatError::NotMember { user_id }),
            };
        }

        if let Some(user) = self.users.find_summary(user_id).await? {
            self.announce(&room, &user, LiveEventKind::Leave);
        }
        Ok(())
    }

    /// Rooms the user belongs to, newest first.
    pub async fn list_rooms_for_user(&self, user_id: i64) -> ChatResult<Vec<RoomView>> {
        let rooms = self.rooms.list_for_user(user_id).await?;
        Ok(rooms.into_iter().map(RoomView::from).collect())
    }

    pub async fn list_public_rooms(&self, request: PageRequest) -> ChatResult<Page<RoomView>> {
        let rooms = self
            .rooms
            .list_public(request.limit(), request.offset())
            .await?;
        let total = self.rooms.count_public().await?;

        Ok(Page::new(rooms, request, total).map(RoomView::from))
    }

    /// Resolves a room the user belongs to.
    pub async fn ensure_member(&self, room_id: &str, user_id: i64) -> ChatResult<Room> {
        let room = self.require_room(room_id).await?;
        if !self.membership.is_member(user_id, room.id).await? {
            return Err(ChatError::forbidden("not a member of this room"));
        }
        Ok(room)
    }

    pub(crate) async fn require_room(&self, room_id: &str) -> ChatResult<Room> {
        self.rooms
            .find_by_public_id(room_id)
            .await?
            .ok_or_else(|| ChatError::room_not_found(room_id))
    }

    async fn require_user(&self, user_id: i64) -> ChatResult<UserSummary> {
        self.users
            .find_summary(user_id)
            .await?
            .ok_or(ChatError::UserNotFound { id: user_id })
    }

    fn announce(&self, room: &Room, user: &UserSummary, kind: LiveEventKind) {
        let event = LiveEvent::presence(
            room.public_id.clone(),
            kind,
            EventSender {
                id: user.id,
                username: user.username.clone(),
            },
            now_timestamp(),
        );
        let delivered = self.broadcaster.publish(&room.public_id, event);
        debug!(room_id = %room.public_id, user_id = user.id, ?kind, delivered, "announced membership change");
        if kind == LiveEventKind::Leave {
            info!(room_id = %room.public_id, user_id = user.id, "member left room");
        }
    }
}
