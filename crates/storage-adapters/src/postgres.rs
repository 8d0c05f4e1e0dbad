//! # PgStore
//!
//! PostgreSQL implementation of the repository ports. Multi-row writes
//! (a post with its ingredients, steps and tags; a user with default boxes)
//! run inside one transaction.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Attribution, BoxId, BoxMembership, BoxRepo, BoxType, Comment, CommentId, CommentRepo,
    Difficulty, Ingredient, Inspiration, NewComment, NewRecipeBox, NewRecipePost, NewUser, Page,
    PostContent, PostId, PostQuery, PostRepo, RecipeBox, RecipePost, SaveOutcome, SourceType, Step,
    StoreError, StoreResult, Tag, User, UserId, UserRepo,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn db_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            StoreError::Missing("referenced row", db.constraint().unwrap_or("unknown").to_string())
        }
        other => StoreError::Backend(other.into()),
    }
}

fn corrupt(what: &str, id: i64, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("corrupt {what} row {id}: {reason}"))
}

/// `%text%` with LIKE metacharacters escaped.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const POST_COLUMNS: &str = "id, user_id, title, description, self_rating, cook_time_minutes, \
     servings, difficulty, image_url, source_type, source_url, source_post_id, source_credit, \
     inspo_post_id, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    async fn load_post(&self, row: PgRow) -> StoreResult<RecipePost> {
        let id: i64 = row.try_get("id").map_err(db_err)?;

        let ingredients: Vec<Ingredient> = sqlx::query(
            "SELECT quantity, unit, name, sort_order FROM ingredients \
             WHERE post_id = $1 ORDER BY sort_order",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|r| Ingredient {
            quantity: r.get("quantity"),
            unit: r.get("unit"),
            name: r.get("name"),
            sort_order: r.get("sort_order"),
        })
        .collect();

        let steps: Vec<Step> = sqlx::query(
            "SELECT body, sort_order FROM steps WHERE post_id = $1 ORDER BY sort_order",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|r| Step {
            body: r.get("body"),
            sort_order: r.get("sort_order"),
        })
        .collect();

        let tags: BTreeSet<Tag> = sqlx::query_scalar::<_, String>(
            "SELECT name FROM post_tags WHERE post_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(|name| Tag::lookup(name).map_err(|e| corrupt("post_tags", id, e)))
        .collect::<StoreResult<_>>()?;

        let difficulty = row
            .get::<Option<String>, _>("difficulty")
            .map(|raw| Difficulty::parse(&raw))
            .transpose()
            .map_err(|e| corrupt("recipe_posts", id, e))?;

        let source_type: SourceType = row
            .get::<String, _>("source_type")
            .parse()
            .map_err(|e| corrupt("recipe_posts", id, e))?;
        let attribution = Attribution::from_parts(
            source_type,
            row.get::<Option<String>, _>("source_url").as_deref(),
            row.get::<Option<i64>, _>("source_post_id").map(PostId),
            row.get::<Option<String>, _>("source_credit").as_deref(),
        )
        .map_err(|e| corrupt("recipe_posts", id, e))?;

        Ok(RecipePost {
            id: PostId(id),
            user_id: UserId(row.get("user_id")),
            content: PostContent {
                title: row.get("title"),
                description: row.get("description"),
                ingredients,
                steps,
                self_rating: row.get("self_rating"),
                cook_time_minutes: row.get("cook_time_minutes"),
                servings: row.get("servings"),
                difficulty,
                image_url: row.get("image_url"),
                tags,
            },
            attribution,
            inspiration: Inspiration::from(row.get::<Option<i64>, _>("inspo_post_id").map(PostId)),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

async fn write_children(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    content: &PostContent,
) -> StoreResult<()> {
    for ingredient in &content.ingredients {
        sqlx::query(
            "INSERT INTO ingredients (post_id, quantity, unit, name, sort_order) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(post_id)
        .bind(&ingredient.quantity)
        .bind(&ingredient.unit)
        .bind(&ingredient.name)
        .bind(ingredient.sort_order)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    }
    for step in &content.steps {
        sqlx::query("INSERT INTO steps (post_id, body, sort_order) VALUES ($1, $2, $3)")
            .bind(post_id)
            .bind(&step.body)
            .bind(step.sort_order)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
    }
    for tag in &content.tags {
        sqlx::query("INSERT INTO post_tags (post_id, category, name) VALUES ($1, $2, $3)")
            .bind(post_id)
            .bind(tag.category.as_str())
            .bind(&tag.name)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
    }
    Ok(())
}

async fn insert_membership(
    tx: &mut Transaction<'_, Postgres>,
    box_id: BoxId,
    post_id: PostId,
) -> StoreResult<Option<DateTime<Utc>>> {
    sqlx::query_scalar(
        "INSERT INTO box_posts (box_id, post_id) VALUES ($1, $2) \
         ON CONFLICT (box_id, post_id) DO NOTHING RETURNING added_at",
    )
    .bind(box_id.get())
    .bind(post_id.get())
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)
}

fn box_from_row(row: &PgRow) -> StoreResult<RecipeBox> {
    let id: i64 = row.get("id");
    let raw_type: String = row.get("box_type");
    let box_type = BoxType::parse(&raw_type).ok_or_else(|| corrupt("recipe_boxes", id, raw_type))?;
    Ok(RecipeBox {
        id: BoxId(id),
        user_id: UserId(row.get("user_id")),
        name: row.get("name"),
        description: row.get("description"),
        is_default: row.get("is_default"),
        box_type,
        created_at: row.get("created_at"),
    })
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: CommentId(row.get("id")),
        post_id: PostId(row.get("post_id")),
        user_id: UserId(row.get("user_id")),
        parent_id: row.get::<Option<i64>, _>("parent_id").map(CommentId),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: UserId(row.get("id")),
        username: row.get("username"),
        display_name: row.get("display_name"),
        bio: row.get("bio"),
        profile_image_url: row.get("profile_image_url"),
        created_at: row.get("created_at"),
    }
}

const USER_COLUMNS: &str =
    "u.id, u.username, u.display_name, u.bio, u.profile_image_url, u.created_at";

#[async_trait]
impl PostRepo for PgStore {
    async fn get_post(&self, id: PostId) -> StoreResult<Option<RecipePost>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM recipe_posts WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(row) => Ok(Some(self.load_post(row).await?)),
            None => Ok(None),
        }
    }

    async fn post_exists(&self, id: PostId) -> StoreResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recipe_posts WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn insert_post(
        &self,
        post: NewRecipePost,
        save_to: Option<BoxId>,
    ) -> StoreResult<RecipePost> {
        let record = post.attribution.to_record();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(
            "INSERT INTO recipe_posts (user_id, title, description, self_rating, \
             cook_time_minutes, servings, difficulty, image_url, source_type, source_url, \
             source_post_id, source_credit, inspo_post_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING id, created_at, updated_at",
        )
        .bind(post.user_id.get())
        .bind(&post.content.title)
        .bind(&post.content.description)
        .bind(post.content.self_rating)
        .bind(post.content.cook_time_minutes)
        .bind(post.content.servings)
        .bind(post.content.difficulty.map(|d| d.as_str()))
        .bind(&post.content.image_url)
        .bind(record.source_type.as_str())
        .bind(&record.source_url)
        .bind(record.source_post_id.map(PostId::get))
        .bind(&record.source_credit)
        .bind(post.inspiration.post_id().map(PostId::get))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let id: i64 = row.get("id");

        write_children(&mut tx, id, &post.content).await?;
        if let Some(box_id) = save_to {
            insert_membership(&mut tx, box_id, PostId(id)).await?;
        }
        tx.commit().await.map_err(db_err)?;

        Ok(RecipePost {
            id: PostId(id),
            user_id: post.user_id,
            content: post.content,
            attribution: post.attribution,
            inspiration: post.inspiration,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn update_post(&self, post: RecipePost) -> StoreResult<Option<RecipePost>> {
        let record = post.attribution.to_record();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "UPDATE recipe_posts SET title = $2, description = $3, self_rating = $4, \
             cook_time_minutes = $5, servings = $6, difficulty = $7, image_url = $8, \
             source_type = $9, source_url = $10, source_post_id = $11, source_credit = $12, \
             inspo_post_id = $13, updated_at = now() \
             WHERE id = $1 RETURNING updated_at",
        )
        .bind(post.id.get())
        .bind(&post.content.title)
        .bind(&post.content.description)
        .bind(post.content.self_rating)
        .bind(post.content.cook_time_minutes)
        .bind(post.content.servings)
        .bind(post.content.difficulty.map(|d| d.as_str()))
        .bind(&post.content.image_url)
        .bind(record.source_type.as_str())
        .bind(&record.source_url)
        .bind(record.source_post_id.map(PostId::get))
        .bind(&record.source_credit)
        .bind(post.inspiration.post_id().map(PostId::get))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let Some(updated_at) = updated_at else {
            return Ok(None);
        };

        for table in ["ingredients", "steps", "post_tags"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE post_id = $1"))
                .bind(post.id.get())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        write_children(&mut tx, post.id.get(), &post.content).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(Some(RecipePost { updated_at, ..post }))
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<bool> {
        // Child tables cascade.
        let result = sqlx::query("DELETE FROM recipe_posts WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_posts(&self, query: PostQuery, page: Page) -> StoreResult<Vec<RecipePost>> {
        let base = format!("SELECT {POST_COLUMNS} FROM recipe_posts p");
        let order = "ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2";
        let limit = i64::from(page.limit);
        let offset = i64::from(page.offset);

        let rows = match query {
            PostQuery::All => sqlx::query(&format!("{base} {order}"))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await,
            PostQuery::ByUser(user_id) => {
                sqlx::query(&format!("{base} WHERE p.user_id = $3 {order}"))
                    .bind(limit)
                    .bind(offset)
                    .bind(user_id.get())
                    .fetch_all(&self.pool)
                    .await
            }
            PostQuery::Text(text) => sqlx::query(&format!(
                "{base} WHERE p.title ILIKE $3 OR EXISTS \
                 (SELECT 1 FROM ingredients i WHERE i.post_id = p.id AND i.name ILIKE $3) {order}"
            ))
            .bind(limit)
            .bind(offset)
            .bind(like_pattern(&text))
            .fetch_all(&self.pool)
            .await,
            PostQuery::Tag { name, category } => sqlx::query(&format!(
                "{base} WHERE EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.id \
                 AND t.name ILIKE $3 AND ($4::TEXT IS NULL OR t.category = $4)) {order}"
            ))
            .bind(limit)
            .bind(offset)
            .bind(like_pattern(&name))
            .bind(category.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(db_err)?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(self.load_post(row).await?);
        }
        Ok(posts)
    }
}

#[async_trait]
impl BoxRepo for PgStore {
    async fn get_box(&self, id: BoxId) -> StoreResult<Option<RecipeBox>> {
        sqlx::query("SELECT * FROM recipe_boxes WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(box_from_row)
            .transpose()
    }

    async fn list_boxes(&self, owner: UserId) -> StoreResult<Vec<RecipeBox>> {
        sqlx::query("SELECT * FROM recipe_boxes WHERE user_id = $1 ORDER BY is_default DESC, id")
            .bind(owner.get())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(box_from_row)
            .collect()
    }

    async fn find_box_by_type(
        &self,
        owner: UserId,
        box_type: BoxType,
    ) -> StoreResult<Option<RecipeBox>> {
        sqlx::query(
            "SELECT * FROM recipe_boxes WHERE user_id = $1 AND box_type = $2 ORDER BY id LIMIT 1",
        )
        .bind(owner.get())
        .bind(box_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .as_ref()
        .map(box_from_row)
        .transpose()
    }

    async fn insert_box(&self, new_box: NewRecipeBox) -> StoreResult<RecipeBox> {
        let row = sqlx::query(
            "INSERT INTO recipe_boxes (user_id, name, description, is_default, box_type) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(new_box.user_id.get())
        .bind(&new_box.name)
        .bind(&new_box.description)
        .bind(new_box.is_default)
        .bind(new_box.box_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        box_from_row(&row)
    }

    async fn update_box(&self, recipe_box: RecipeBox) -> StoreResult<Option<RecipeBox>> {
        sqlx::query("UPDATE recipe_boxes SET name = $2, description = $3 WHERE id = $1 RETURNING *")
            .bind(recipe_box.id.get())
            .bind(&recipe_box.name)
            .bind(&recipe_box.description)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(box_from_row)
            .transpose()
    }

    async fn delete_box(&self, id: BoxId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM recipe_boxes WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_post(&self, box_id: BoxId, post_id: PostId) -> StoreResult<SaveOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let outcome = match insert_membership(&mut tx, box_id, post_id).await? {
            Some(added_at) => SaveOutcome::Created(BoxMembership { box_id, post_id, added_at }),
            None => {
                let added_at = sqlx::query_scalar(
                    "SELECT added_at FROM box_posts WHERE box_id = $1 AND post_id = $2",
                )
                .bind(box_id.get())
                .bind(post_id.get())
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
                SaveOutcome::AlreadySaved(BoxMembership { box_id, post_id, added_at })
            }
        };
        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn unsave_post(&self, box_id: BoxId, post_id: PostId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM box_posts WHERE box_id = $1 AND post_id = $2")
            .bind(box_id.get())
            .bind(post_id.get())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn box_entries(&self, box_id: BoxId) -> StoreResult<Vec<BoxMembership>> {
        let rows = sqlx::query(
            "SELECT post_id, added_at FROM box_posts WHERE box_id = $1 ORDER BY added_at DESC",
        )
        .bind(box_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| BoxMembership {
                box_id,
                post_id: PostId(row.get("post_id")),
                added_at: row.get("added_at"),
            })
            .collect())
    }
}

#[async_trait]
impl CommentRepo for PgStore {
    async fn get_comment(&self, id: CommentId) -> StoreResult<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(comment_from_row))
    }

    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query("SELECT * FROM comments WHERE post_id = $1 ORDER BY created_at, id")
            .bind(post_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let row = sqlx::query(
            "INSERT INTO comments (post_id, user_id, parent_id, body) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(comment.post_id.get())
        .bind(comment.user_id.get())
        .bind(comment.parent_id.map(CommentId::get))
        .bind(&comment.body)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(comment_from_row(&row))
    }

    async fn update_comment_body(
        &self,
        id: CommentId,
        body: String,
    ) -> StoreResult<Option<Comment>> {
        let row = sqlx::query("UPDATE comments SET body = $2 WHERE id = $1 RETURNING *")
            .bind(id.get())
            .bind(body)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(comment_from_row))
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<u64> {
        let removed: i64 = sqlx::query_scalar(
            "WITH RECURSIVE subtree AS ( \
                SELECT id FROM comments WHERE id = $1 \
                UNION ALL \
                SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id \
             ), gone AS (DELETE FROM comments WHERE id IN (SELECT id FROM subtree) RETURNING 1) \
             SELECT COUNT(*) FROM gone",
        )
        .bind(id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(removed as u64)
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn provision_user(&self, user: NewUser) -> StoreResult<(User, bool)> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let inserted = sqlx::query(
            "INSERT INTO users (id, username, display_name) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO NOTHING RETURNING *",
        )
        .bind(user.id.get())
        .bind(&user.username)
        .bind(&user.display_name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = inserted else {
            let existing = sqlx::query("SELECT * FROM users WHERE id = $1")
                .bind(user.id.get())
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
            tx.commit().await.map_err(db_err)?;
            return Ok((user_from_row(&existing), false));
        };

        for default_box in NewRecipeBox::defaults_for(user.id) {
            sqlx::query(
                "INSERT INTO recipe_boxes (user_id, name, description, is_default, box_type) \
                 VALUES ($1, $2, $3, TRUE, $4)",
            )
            .bind(default_box.user_id.get())
            .bind(&default_box.name)
            .bind(&default_box.description)
            .bind(default_box.box_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok((user_from_row(&row), true))
    }

    async fn update_user(&self, user: User) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "UPDATE users SET display_name = $2, bio = $3, profile_image_url = $4 \
             WHERE id = $1 RETURNING *",
        )
        .bind(user.id.get())
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.profile_image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn search_users(&self, text: String, page: Page) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT * FROM users WHERE username ILIKE $1 OR display_name ILIKE $1 \
             ORDER BY username LIMIT $2 OFFSET $3",
        )
        .bind(like_pattern(&text))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn follow(&self, follower: UserId, followed: UserId) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(follower.get())
        .bind(followed.get())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower: UserId, followed: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
            .bind(follower.get())
            .bind(followed.get())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn follow_counts(&self, user: UserId) -> StoreResult<(u64, u64)> {
        let row = sqlx::query(
            "SELECT (SELECT COUNT(*) FROM follows WHERE followed_id = $1) AS followers, \
                    (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following",
        )
        .bind(user.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        let followers: i64 = row.get("followers");
        let following: i64 = row.get("following");
        Ok((followers as u64, following as u64))
    }

    async fn list_followers(&self, user: UserId) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM follows f JOIN users u ON u.id = f.follower_id \
             WHERE f.followed_id = $1 ORDER BY f.created_at DESC"
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn list_following(&self, user: UserId) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM follows f JOIN users u ON u.id = f.followed_id \
             WHERE f.follower_id = $1 ORDER BY f.created_at DESC"
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(user_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("pasta"), "%pasta%");
        assert_eq!(like_pattern("100%_pure"), "%100\\%\\_pure%");
    }

    #[test]
    fn pool_exhaustion_is_transient() {
        assert!(matches!(db_err(sqlx::Error::PoolTimedOut), StoreError::Unavailable(_)));
        assert!(matches!(db_err(sqlx::Error::RowNotFound), StoreError::Backend(_)));
    }
}
