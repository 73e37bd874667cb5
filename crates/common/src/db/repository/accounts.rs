//! Users and their profiles

use super::*;
use crate::forms::{ProfileForm, RegisterForm};
use crate::imaging::ImageSource;
use crate::metrics::{record_image, record_write};
use crate::validation::{check_upload, Upload};
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user: User,
    pub profile: Profile,
}

impl Repository {
    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Create a user together with its profile.
    ///
    /// The profile starts with the default avatar, which the image pipeline
    /// copies to the user's canonical avatar path.
    pub async fn register_user(&self, form: RegisterForm) -> Result<ProfileView> {
        form.clean()?;
        let username = form.username.trim().to_string();

        let txn = self.write_conn().begin().await?;

        let taken = UserEntity::find()
            .filter(UserColumn::Username.eq(username.as_str()))
            .count(&txn)
            .await?;
        if taken > 0 {
            return Err(AppError::field(
                "username",
                "A user with that username already exists.",
            ));
        }

        let now = now();
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            email: Set(form.email.trim().to_string()),
            first_name: Set(form.first_name.trim().to_string()),
            last_name: Set(form.last_name.trim().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| unique_violation(e, "user", "username"))?;

        let default_avatar = self.images.default_path(ImageKind::Avatar).to_string();
        let profile = ProfileActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            avatar: Set(default_avatar.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let (profile, superseded) = self
            .store_avatar(&txn, profile, ImageSource::Stored(Some(default_avatar)))
            .await?;

        txn.commit().await?;
        self.release_image(ImageKind::Avatar, superseded);

        record_write("user", "create");
        info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(ProfileView { user, profile })
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<ProfileView> {
        let user = UserEntity::find_by_id(user_id)
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))?;

        let profile = ProfileEntity::find()
            .filter(ProfileColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::not_found("profile", user_id))?;

        Ok(ProfileView { user, profile })
    }

    pub async fn update_profile(&self, user_id: Uuid, form: ProfileForm) -> Result<ProfileView> {
        form.clean()?;

        let view = self.get_profile(user_id).await?;
        let mut user = view.user.into_active_model();
        user.email = Set(form.email.trim().to_string());
        user.first_name = Set(form.first_name.trim().to_string());
        user.last_name = Set(form.last_name.trim().to_string());
        user.updated_at = Set(now());
        let user = user.update(self.write_conn()).await?;

        record_write("profile", "update");
        info!(user_id = %user_id, "Profile updated");

        Ok(ProfileView {
            user,
            profile: view.profile,
        })
    }

    /// Replace the avatar with a validated upload
    pub async fn update_avatar(&self, user_id: Uuid, upload: Upload) -> Result<ProfileView> {
        check_upload("avatar", &upload, &self.media)?;

        let view = self.get_profile(user_id).await?;
        let txn = self.write_conn().begin().await?;
        let (profile, superseded) = self
            .store_avatar(&txn, view.profile, ImageSource::Upload(upload.bytes))
            .await?;
        txn.commit().await?;
        self.release_image(ImageKind::Avatar, superseded);

        info!(user_id = %user_id, avatar = %profile.avatar, "Avatar updated");

        Ok(ProfileView {
            user: view.user,
            profile,
        })
    }

    async fn store_avatar<C: ConnectionTrait>(
        &self,
        conn: &C,
        profile: Profile,
        source: ImageSource,
    ) -> Result<(Profile, Option<String>)> {
        let started = Instant::now();
        let canonical = ImageProcessor::avatar_path(profile.user_id);
        let stored = self
            .images
            .store_blocking(ImageKind::Avatar, canonical, source)
            .await?;
        if stored.unchanged {
            return Ok((profile, None));
        }
        record_image(started.elapsed().as_secs_f64(), "avatar", stored.fell_back);

        let mut active = profile.into_active_model();
        active.avatar = Set(stored.path);
        active.updated_at = Set(now());
        Ok((active.update(conn).await?, stored.superseded))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::test_helpers::{encoded, png_dimensions};
    use image::ImageFormat;

    #[tokio::test]
    async fn test_register_creates_profile_with_avatar() {
        let (repo, _media) = repository().await;
        let user_id = user(&repo, "reader").await;

        let view = repo.get_profile(user_id).await.unwrap();
        assert_eq!(view.user.username, "reader");
        assert_eq!(view.profile.avatar, ImageProcessor::avatar_path(user_id));
        // No default avatar on disk: a placeholder is written
        assert!(repo.images().absolute(&view.profile.avatar).exists());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (repo, _media) = repository().await;
        user(&repo, "reader").await;

        let err = repo
            .register_user(RegisterForm {
                username: "reader".into(),
                email: "other@example.com".into(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .unwrap_err();
        assert!(err.form_errors().unwrap().has("username"));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (repo, _media) = repository().await;
        let user_id = user(&repo, "reader").await;

        let view = repo
            .update_profile(
                user_id,
                ProfileForm {
                    email: "new@example.com".into(),
                    first_name: "Ada".into(),
                    last_name: "Lovelace".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.user.email, "new@example.com");
        assert_eq!(view.user.first_name, "Ada");
    }

    #[tokio::test]
    async fn test_avatar_upload_is_thumbnailed() {
        let (repo, _media) = repository().await;
        let user_id = user(&repo, "reader").await;

        let view = repo
            .update_avatar(
                user_id,
                Upload::new("me.jpg", encoded(1000, 500, ImageFormat::Jpeg)),
            )
            .await
            .unwrap();

        let path = repo.images().absolute(&view.profile.avatar);
        assert_eq!(png_dimensions(&path), (200, 100));
    }

    #[tokio::test]
    async fn test_avatar_rejects_bad_extension_before_write() {
        let (repo, _media) = repository().await;
        let user_id = user(&repo, "reader").await;
        let before = repo.get_profile(user_id).await.unwrap();

        let err = repo
            .update_avatar(
                user_id,
                Upload::new("me.bmp", encoded(10, 10, ImageFormat::Png)),
            )
            .await
            .unwrap_err();
        assert!(err.form_errors().unwrap().has("avatar"));

        let after = repo.get_profile(user_id).await.unwrap();
        assert_eq!(before.profile.updated_at, after.profile.updated_at);
    }
}
