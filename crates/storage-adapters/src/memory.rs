//! # InMemoryStore
//!
//! Process-local implementation of every repository port. All tables sit
//! behind one lock, so each port call is atomic the same way a database
//! transaction would be.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    BoxId, BoxMembership, BoxRepo, BoxType, Comment, CommentId, CommentRepo, NewComment,
    NewRecipeBox, NewRecipePost, NewUser, Page, PostId, PostQuery, PostRepo, RecipeBox, RecipePost,
    SaveOutcome, StoreError, StoreResult, User, UserId, UserRepo,
};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    next_post: i64,
    next_box: i64,
    next_comment: i64,
    posts: BTreeMap<PostId, RecipePost>,
    boxes: BTreeMap<BoxId, RecipeBox>,
    /// Insertion order is save order.
    memberships: Vec<BoxMembership>,
    comments: BTreeMap<CommentId, Comment>,
    users: BTreeMap<UserId, User>,
    follows: BTreeMap<(UserId, UserId), DateTime<Utc>>,
}

impl Tables {
    fn insert_box(&mut self, new_box: NewRecipeBox) -> RecipeBox {
        self.next_box += 1;
        let recipe_box = RecipeBox {
            id: BoxId(self.next_box),
            user_id: new_box.user_id,
            name: new_box.name,
            description: new_box.description,
            is_default: new_box.is_default,
            box_type: new_box.box_type,
            created_at: Utc::now(),
        };
        self.boxes.insert(recipe_box.id, recipe_box.clone());
        recipe_box
    }

    fn save(&mut self, box_id: BoxId, post_id: PostId) -> SaveOutcome {
        if let Some(existing) = self
            .memberships
            .iter()
            .find(|m| m.box_id == box_id && m.post_id == post_id)
        {
            return SaveOutcome::AlreadySaved(existing.clone());
        }
        let membership = BoxMembership {
            box_id,
            post_id,
            added_at: Utc::now(),
        };
        self.memberships.push(membership.clone());
        SaveOutcome::Created(membership)
    }

    fn users_where(&self, keep: impl Fn(&(UserId, UserId)) -> Option<UserId>) -> Vec<User> {
        self.follows
            .keys()
            .filter_map(keep)
            .filter_map(|id| self.users.get(&id).cloned())
            .collect()
    }
}

fn matches_query(post: &RecipePost, query: &PostQuery) -> bool {
    match query {
        PostQuery::All => true,
        PostQuery::ByUser(user_id) => post.user_id == *user_id,
        PostQuery::Text(text) => {
            let needle = text.to_lowercase();
            post.content.title.to_lowercase().contains(&needle)
                || post
                    .content
                    .ingredients
                    .iter()
                    .any(|i| i.name.to_lowercase().contains(&needle))
        }
        PostQuery::Tag { name, category } => {
            let needle = name.to_lowercase();
            post.content
                .tags
                .iter()
                .any(|t| t.name.contains(&needle) && category.map_or(true, |c| t.category == c))
        }
    }
}

fn paginate<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items.skip(page.offset as usize).take(page.limit as usize).collect()
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepo for InMemoryStore {
    async fn get_post(&self, id: PostId) -> StoreResult<Option<RecipePost>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn post_exists(&self, id: PostId) -> StoreResult<bool> {
        Ok(self.tables.read().await.posts.contains_key(&id))
    }

    async fn insert_post(
        &self,
        post: NewRecipePost,
        save_to: Option<BoxId>,
    ) -> StoreResult<RecipePost> {
        let mut tables = self.tables.write().await;
        tables.next_post += 1;
        let now = Utc::now();
        let stored = RecipePost {
            id: PostId(tables.next_post),
            user_id: post.user_id,
            content: post.content,
            attribution: post.attribution,
            inspiration: post.inspiration,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(stored.id, stored.clone());
        if let Some(box_id) = save_to {
            if tables.boxes.contains_key(&box_id) {
                tables.save(box_id, stored.id);
            } else {
                debug!(box_id = %box_id, "auto-save target box is gone");
            }
        }
        Ok(stored)
    }

    async fn update_post(&self, post: RecipePost) -> StoreResult<Option<RecipePost>> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.posts.get_mut(&post.id) else {
            return Ok(None);
        };
        existing.content = post.content;
        existing.attribution = post.attribution;
        existing.inspiration = post.inspiration;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.comments.retain(|_, c| c.post_id != id);
        tables.memberships.retain(|m| m.post_id != id);
        Ok(true)
    }

    async fn list_posts(&self, query: PostQuery, page: Page) -> StoreResult<Vec<RecipePost>> {
        let tables = self.tables.read().await;
        let newest_first = tables
            .posts
            .values()
            .rev()
            .filter(|post| matches_query(post, &query))
            .cloned();
        Ok(paginate(newest_first, page))
    }
}

#[async_trait]
impl BoxRepo for InMemoryStore {
    async fn get_box(&self, id: BoxId) -> StoreResult<Option<RecipeBox>> {
        Ok(self.tables.read().await.boxes.get(&id).cloned())
    }

    async fn list_boxes(&self, owner: UserId) -> StoreResult<Vec<RecipeBox>> {
        let tables = self.tables.read().await;
        Ok(tables.boxes.values().filter(|b| b.user_id == owner).cloned().collect())
    }

    async fn find_box_by_type(
        &self,
        owner: UserId,
        box_type: BoxType,
    ) -> StoreResult<Option<RecipeBox>> {
        let tables = self.tables.read().await;
        Ok(tables
            .boxes
            .values()
            .find(|b| b.user_id == owner && b.box_type == box_type)
            .cloned())
    }

    async fn insert_box(&self, new_box: NewRecipeBox) -> StoreResult<RecipeBox> {
        Ok(self.tables.write().await.insert_box(new_box))
    }

    async fn update_box(&self, recipe_box: RecipeBox) -> StoreResult<Option<RecipeBox>> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.boxes.get_mut(&recipe_box.id) else {
            return Ok(None);
        };
        existing.name = recipe_box.name;
        existing.description = recipe_box.description;
        Ok(Some(existing.clone()))
    }

    async fn delete_box(&self, id: BoxId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.boxes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.memberships.retain(|m| m.box_id != id);
        Ok(true)
    }

    async fn save_post(&self, box_id: BoxId, post_id: PostId) -> StoreResult<SaveOutcome> {
        let mut tables = self.tables.write().await;
        if !tables.boxes.contains_key(&box_id) {
            return Err(StoreError::Missing("box", box_id.to_string()));
        }
        if !tables.posts.contains_key(&post_id) {
            return Err(StoreError::Missing("post", post_id.to_string()));
        }
        Ok(tables.save(box_id, post_id))
    }

    async fn unsave_post(&self, box_id: BoxId, post_id: PostId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.memberships.len();
        tables
            .memberships
            .retain(|m| !(m.box_id == box_id && m.post_id == post_id));
        Ok(tables.memberships.len() != before)
    }

    async fn box_entries(&self, box_id: BoxId) -> StoreResult<Vec<BoxMembership>> {
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .iter()
            .rev()
            .filter(|m| m.box_id == box_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommentRepo for InMemoryStore {
    async fn get_comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(StoreError::Conflict(format!("post {} no longer exists", comment.post_id)));
        }
        tables.next_comment += 1;
        let stored = Comment {
            id: CommentId(tables.next_comment),
            post_id: comment.post_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            body: comment.body,
            created_at: Utc::now(),
        };
        tables.comments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_comment_body(
        &self,
        id: CommentId,
        body: String,
    ) -> StoreResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.get_mut(&id).map(|c| {
            c.body = body;
            c.clone()
        }))
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        if !tables.comments.contains_key(&id) {
            return Ok(0);
        }
        let mut doomed = BTreeSet::from([id]);
        loop {
            let replies: Vec<CommentId> = tables
                .comments
                .values()
                .filter(|c| {
                    c.parent_id.is_some_and(|p| doomed.contains(&p)) && !doomed.contains(&c.id)
                })
                .map(|c| c.id)
                .collect();
            if replies.is_empty() {
                break;
            }
            doomed.extend(replies);
        }
        tables.comments.retain(|id, _| !doomed.contains(id));
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl UserRepo for InMemoryStore {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn provision_user(&self, user: NewUser) -> StoreResult<(User, bool)> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.users.get(&user.id) {
            return Ok((existing.clone(), false));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username {} is taken", user.username)));
        }
        let stored = User {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            bio: None,
            profile_image_url: None,
            created_at: Utc::now(),
        };
        tables.users.insert(stored.id, stored.clone());
        for default_box in NewRecipeBox::defaults_for(stored.id) {
            tables.insert_box(default_box);
        }
        Ok((stored, true))
    }

    async fn update_user(&self, user: User) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.users.get_mut(&user.id) else {
            return Ok(None);
        };
        existing.display_name = user.display_name;
        existing.bio = user.bio;
        existing.profile_image_url = user.profile_image_url;
        Ok(Some(existing.clone()))
    }

    async fn search_users(&self, text: String, page: Page) -> StoreResult<Vec<User>> {
        let needle = text.to_lowercase();
        let tables = self.tables.read().await;
        let mut found: Vec<User> = tables
            .users
            .values()
            .filter(|u| {
                u.username.contains(&needle) || u.display_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(paginate(found.into_iter(), page))
    }

    async fn follow(&self, follower: UserId, followed: UserId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.follows.contains_key(&(follower, followed)) {
            return Ok(false);
        }
        tables.follows.insert((follower, followed), Utc::now());
        Ok(true)
    }

    async fn unfollow(&self, follower: UserId, followed: UserId) -> StoreResult<bool> {
        Ok(self.tables.write().await.follows.remove(&(follower, followed)).is_some())
    }

    async fn follow_counts(&self, user: UserId) -> StoreResult<(u64, u64)> {
        let tables = self.tables.read().await;
        let followers = tables.follows.keys().filter(|(_, followed)| *followed == user).count();
        let following = tables.follows.keys().filter(|(follower, _)| *follower == user).count();
        Ok((followers as u64, following as u64))
    }

    async fn list_followers(&self, user: UserId) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users_where(|(follower, followed)| (*followed == user).then_some(*follower)))
    }

    async fn list_following(&self, user: UserId) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users_where(|(follower, followed)| (*follower == user).then_some(*followed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{Attribution, Inspiration, PostContent, PostDraft, StepInput, IngredientInput};

    fn new_post(user: i64, title: &str, tags: &[&str]) -> NewRecipePost {
        NewRecipePost {
            user_id: UserId(user),
            content: PostContent::from_draft(&PostDraft {
                title: Some(title.into()),
                self_rating: Some(4),
                ingredients: vec![IngredientInput {
                    name: Some("garlic".into()),
                    ..Default::default()
                }],
                steps: vec![StepInput { body: Some("stir".into()) }],
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            })
            .unwrap(),
            attribution: Attribution::Original,
            inspiration: Inspiration::none(),
        }
    }

    async fn provisioned(store: &InMemoryStore, id: i64, name: &str) -> User {
        store
            .provision_user(NewUser {
                id: UserId(id),
                username: name.into(),
                display_name: name.into(),
            })
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn provisioning_creates_default_boxes_once() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        let (_, created) = store
            .provision_user(NewUser {
                id: UserId(1),
                username: "alice".into(),
                display_name: "Alice".into(),
            })
            .await
            .unwrap();
        assert!(!created);

        let boxes = store.list_boxes(UserId(1)).await.unwrap();
        assert_eq!(boxes.len(), 3);
        assert!(boxes.iter().all(|b| b.is_default));
    }

    #[tokio::test]
    async fn username_must_be_unique() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        let err = store
            .provision_user(NewUser {
                id: UserId(2),
                username: "alice".into(),
                display_name: "Other".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn save_is_insert_if_absent() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        let post = store.insert_post(new_post(1, "Soup", &[]), None).await.unwrap();
        let box_id = store.list_boxes(UserId(1)).await.unwrap()[0].id;

        assert!(store.save_post(box_id, post.id).await.unwrap().is_new());
        assert!(!store.save_post(box_id, post.id).await.unwrap().is_new());
        assert_eq!(store.box_entries(box_id).await.unwrap().len(), 1);

        assert!(store.unsave_post(box_id, post.id).await.unwrap());
        assert!(!store.unsave_post(box_id, post.id).await.unwrap());
    }

    #[tokio::test]
    async fn saving_into_a_deleted_box_is_not_found() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        let post = store.insert_post(new_post(1, "Soup", &[]), None).await.unwrap();
        let weeknight = store
            .insert_box(NewRecipeBox {
                user_id: UserId(1),
                name: "Weeknight".into(),
                description: None,
                is_default: false,
                box_type: BoxType::Custom,
            })
            .await
            .unwrap();
        assert!(store.delete_box(weeknight.id).await.unwrap());

        let err = store.save_post(weeknight.id, post.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing("box", _)));
        assert!(matches!(domains::AppError::from(err), domains::AppError::NotFound("box", _)));

        let box_id = store.list_boxes(UserId(1)).await.unwrap()[0].id;
        let err = store.save_post(box_id, PostId(404)).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing("post", _)));
    }

    #[tokio::test]
    async fn insert_can_save_into_box_in_the_same_write() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        let cooked = store.find_box_by_type(UserId(1), BoxType::Cooked).await.unwrap().unwrap();

        let post = store.insert_post(new_post(1, "Stew", &[]), Some(cooked.id)).await.unwrap();
        let entries = store.box_entries(cooked.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].post_id, post.id);
    }

    #[tokio::test]
    async fn deleting_a_post_cascades() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        let post = store.insert_post(new_post(1, "Soup", &[]), None).await.unwrap();
        let box_id = store.list_boxes(UserId(1)).await.unwrap()[0].id;
        store.save_post(box_id, post.id).await.unwrap();
        store
            .insert_comment(NewComment {
                post_id: post.id,
                user_id: UserId(1),
                parent_id: None,
                body: "yum".into(),
            })
            .await
            .unwrap();

        assert!(store.delete_post(post.id).await.unwrap());
        assert!(store.box_entries(box_id).await.unwrap().is_empty());
        assert!(store.list_comments(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_comment_removes_its_replies() {
        let store = InMemoryStore::new();
        let post = store.insert_post(new_post(1, "Soup", &[]), None).await.unwrap();
        let mut parent = None;
        let mut ids = Vec::new();
        for body in ["top", "reply", "reply to reply"] {
            let c = store
                .insert_comment(NewComment {
                    post_id: post.id,
                    user_id: UserId(1),
                    parent_id: parent,
                    body: body.into(),
                })
                .await
                .unwrap();
            parent = Some(c.id);
            ids.push(c.id);
        }
        assert_eq!(store.delete_comment(ids[1]).await.unwrap(), 2);
        assert_eq!(store.list_comments(post.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filtered() {
        let store = InMemoryStore::new();
        store.insert_post(new_post(1, "Tacos", &["mexican"]), None).await.unwrap();
        store.insert_post(new_post(2, "Ramen", &["japanese", "vegan"]), None).await.unwrap();
        store.insert_post(new_post(1, "Pizza", &["italian"]), None).await.unwrap();

        let all = store.list_posts(PostQuery::All, Page::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|p| p.content.title.as_str()).collect();
        assert_eq!(titles, ["Pizza", "Ramen", "Tacos"]);

        let mine = store.list_posts(PostQuery::ByUser(UserId(1)), Page::default()).await.unwrap();
        assert_eq!(mine.len(), 2);

        let vegan = store
            .list_posts(
                PostQuery::Tag {
                    name: "veg".into(),
                    category: Some(domains::TagCategory::Dietary),
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(vegan.len(), 1);

        let by_ingredient = store
            .list_posts(PostQuery::Text("GARLIC".into()), Page::default())
            .await
            .unwrap();
        assert_eq!(by_ingredient.len(), 3);

        let paged = store
            .list_posts(PostQuery::All, Page { limit: 1, offset: 1 })
            .await
            .unwrap();
        assert_eq!(paged[0].content.title, "Ramen");
    }

    #[tokio::test]
    async fn follow_is_idempotent_and_counted() {
        let store = InMemoryStore::new();
        provisioned(&store, 1, "alice").await;
        provisioned(&store, 2, "bob").await;

        assert!(store.follow(UserId(1), UserId(2)).await.unwrap());
        assert!(!store.follow(UserId(1), UserId(2)).await.unwrap());
        assert_eq!(store.follow_counts(UserId(2)).await.unwrap(), (1, 0));
        assert_eq!(store.list_followers(UserId(2)).await.unwrap()[0].username, "alice");
        assert!(store.unfollow(UserId(1), UserId(2)).await.unwrap());
        assert_eq!(store.follow_counts(UserId(2)).await.unwrap(), (0, 0));
    }
}
