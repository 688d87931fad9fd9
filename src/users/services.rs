use tracing::{debug, info, warn};

use super::dto::{RegisterFiles, RegisterForm};
use super::repo_types::{NewUser, PublicUser};
use crate::error::ApiError;
use crate::media::services::upload_on_host;
use crate::state::AppState;

/// Validate, de-duplicate, upload media, persist, and read back a new user.
///
/// The duplicate check and the insert are not atomic; the unique
/// constraints on `users` catch whatever slips through.
pub async fn register_user(
    st: &AppState,
    form: RegisterForm,
    files: RegisterFiles<'_>,
) -> Result<PublicUser, ApiError> {
    let reg = form.validate().map_err(|e| {
        warn!(error = %e, "registration rejected");
        e
    })?;
    let username = reg.username.to_lowercase();

    if st
        .users
        .find_by_username_or_email(&username, &reg.email)
        .await?
        .is_some()
    {
        warn!(%username, "user already exists");
        return Err(ApiError::Conflict("User already exists.".into()));
    }

    let Some(avatar_file) = files.avatar.first() else {
        warn!(%username, "avatar missing");
        return Err(ApiError::InvalidInput("Avatar file is required".into()));
    };
    let cover_file = files.cover_image.first();

    if cover_file.is_some_and(|c| c.path == avatar_file.path) {
        warn!(%username, "avatar and cover image share a file");
        return Err(ApiError::InvalidInput(
            "Avatar and cover image file must be different".into(),
        ));
    }
    debug!(
        avatar = %avatar_file.file_name,
        avatar_size = avatar_file.size,
        cover = cover_file.map(|c| c.file_name.as_str()),
        "uploading media"
    );

    let prefix = &st.config.media.key_prefix;
    let avatar = upload_on_host(st.storage.as_ref(), prefix, Some(avatar_file.path.as_path()))
        .await
        .map_err(ApiError::UploadFailed)?
        .ok_or_else(|| ApiError::UploadFailed(anyhow::anyhow!("no descriptor for avatar")))?;
    debug!(
        key = %avatar.key,
        bytes = avatar.bytes,
        content_type = avatar.content_type,
        "avatar stored"
    );
    let cover = upload_on_host(
        st.storage.as_ref(),
        prefix,
        cover_file.map(|c| c.path.as_path()),
    )
    .await
    .map_err(ApiError::UploadFailed)?;

    let user = st
        .users
        .create(NewUser {
            full_name: reg.full_name,
            email: reg.email,
            username,
            password: reg.password,
            avatar: avatar.url,
            cover_image: cover.map(|c| c.url).unwrap_or_default(),
        })
        .await?;

    let Some(created) = st.users.find_public_by_id(user.id).await? else {
        return Err(ApiError::Internal(
            "Something went wrong while registering the user".into(),
        ));
    };

    info!(user_id = %created.id, username = %created.username, "user registered");
    Ok(created)
}
