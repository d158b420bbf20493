use std::path::PathBuf;
use std::time::Duration;

use image::DynamicImage;
use log::{debug, error, info, warn};
use ratatui::style::Color;
use tokio::sync::mpsc;

use crate::api::{ApiClient, RECOMMENDATION_COUNT};
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    Chapter, ChapterId, Comment, CommentId, Credentials, Manga, MangaId, PersonalEntry,
    ReadingStatus, User,
};
use crate::personal;

#[derive(Debug)]
pub enum Action {
    SignIn(Credentials),
    RestoreSession,
    Search(String),
    Recommendations,
    FetchManga(MangaId),
    FetchComments(MangaId),
    PostComment {
        manga_id: MangaId,
        text: String,
        parent: Option<CommentId>,
    },
    DeleteComment {
        manga_id: MangaId,
        comment_id: CommentId,
    },
    LikeComment {
        manga_id: MangaId,
        comment_id: CommentId,
    },
    FetchChapter {
        manga_id: MangaId,
        chapter_id: ChapterId,
    },
    MarkChapterRead {
        manga_id: MangaId,
        chapter_id: ChapterId,
        number: f64,
    },
    FetchPersonalList,
    AddToPersonalList(MangaId),
    RemoveFromPersonalList(MangaId),
    DownloadImage(String),
}

pub enum NetworkEvent {
    SignedIn(User),
    SignedOut,
    MangasLoaded { heading: String, mangas: Vec<Manga> },
    MangaLoaded(Manga),
    CommentsLoaded { manga_id: MangaId, comments: Vec<Comment> },
    ChapterLoaded { manga_id: MangaId, chapter_id: ChapterId, chapter: Chapter },
    PageImageDownloaded(String, DynamicImage),
    PersonalListLoaded(Vec<PersonalEntry>),
    ThemeUpdate(Color),
    Notice(String),
    Error(String),
}

fn report(event_tx: &mpsc::UnboundedSender<NetworkEvent>, context: &str, err: ApiError) {
    error!("{context}: {err}");
    if matches!(err, ApiError::Unauthorized) {
        let _ = event_tx.send(NetworkEvent::SignedOut);
    }
    let _ = event_tx.send(NetworkEvent::Error(format!("{context}: {err}")));
}

async fn reload_comments(client: &ApiClient, manga_id: MangaId, event_tx: &mpsc::UnboundedSender<NetworkEvent>) {
    match client.comments(manga_id).await {
        Ok(comments) => {
            let _ = event_tx.send(NetworkEvent::CommentsLoaded { manga_id, comments });
        }
        Err(e) => report(event_tx, "Could not load comments", e),
    }
}

async fn reload_personal_list(client: &ApiClient, event_tx: &mpsc::UnboundedSender<NetworkEvent>) {
    match client.personal_list().await {
        Ok(entries) => {
            let _ = event_tx.send(NetworkEvent::PersonalListLoaded(entries));
        }
        Err(e) => report(event_tx, "Could not load your list", e),
    }
}

async fn handle(client: ApiClient, action: Action, event_tx: mpsc::UnboundedSender<NetworkEvent>) {
    match action {
        Action::SignIn(credentials) => {
            let signed_in = async {
                client.login(&credentials).await?;
                client.current_user().await
            };
            match signed_in.await {
                Ok(user) => {
                    info!("signed in as {}", user.username);
                    let _ = event_tx.send(NetworkEvent::SignedIn(user));
                }
                Err(e) => {
                    client.set_token(None);
                    report(&event_tx, "Sign in failed", e);
                }
            }
        }
        Action::RestoreSession => {
            if client.token().is_none() {
                return;
            }
            match client.current_user().await {
                Ok(user) => {
                    info!("session restored for {}", user.username);
                    let _ = event_tx.send(NetworkEvent::SignedIn(user));
                }
                Err(e) => {
                    warn!("stored token rejected: {e}");
                    client.set_token(None);
                    let _ = event_tx.send(NetworkEvent::SignedOut);
                }
            }
        }
        Action::Search(title) => match client.mangas(Some(title.as_str())).await {
            Ok(mangas) => {
                let heading = if title.is_empty() {
                    "Catalog".to_string()
                } else {
                    format!("Results for \"{title}\"")
                };
                let _ = event_tx.send(NetworkEvent::MangasLoaded { heading, mangas });
            }
            Err(e) => report(&event_tx, "Search failed", e),
        },
        Action::Recommendations => match client.recommendations(RECOMMENDATION_COUNT).await {
            Ok(mangas) => {
                let heading = "Recommended for you".to_string();
                let _ = event_tx.send(NetworkEvent::MangasLoaded { heading, mangas });
            }
            Err(e) => report(&event_tx, "Could not load recommendations", e),
        },
        Action::FetchManga(id) => match client.manga_detail(id).await {
            Ok(manga) => {
                let _ = event_tx.send(NetworkEvent::MangaLoaded(manga));
            }
            Err(e) => report(&event_tx, "Could not load manga", e),
        },
        Action::FetchComments(manga_id) => reload_comments(&client, manga_id, &event_tx).await,
        Action::PostComment { manga_id, text, parent } => {
            match client.create_comment(manga_id, &text, parent).await {
                Ok(_) => reload_comments(&client, manga_id, &event_tx).await,
                Err(e) => report(&event_tx, "Could not post comment", e),
            }
        }
        Action::DeleteComment { manga_id, comment_id } => {
            match client.delete_comment(comment_id).await {
                Ok(_) => reload_comments(&client, manga_id, &event_tx).await,
                Err(e) => report(&event_tx, "Could not delete comment", e),
            }
        }
        Action::LikeComment { manga_id, comment_id } => {
            match client.like_comment(comment_id).await {
                Ok(_) => reload_comments(&client, manga_id, &event_tx).await,
                Err(e) => report(&event_tx, "Could not like comment", e),
            }
        }
        Action::FetchChapter { manga_id, chapter_id } => {
            match client.chapter_pages(chapter_id, manga_id).await {
                Ok(chapter) => {
                    debug!("chapter {chapter_id}: {} pages", chapter.pages.len());
                    let _ = event_tx.send(NetworkEvent::ChapterLoaded { manga_id, chapter_id, chapter });
                }
                Err(e) => report(&event_tx, "Could not load chapter", e),
            }
        }
        Action::MarkChapterRead { manga_id, chapter_id, number } => {
            let update = personal::chapter_opened(chapter_id, number);
            if let Err(e) = client.update_personal_entry(manga_id, &update).await {
                report(&event_tx, "Could not update reading progress", e);
            }
        }
        Action::FetchPersonalList => reload_personal_list(&client, &event_tx).await,
        Action::AddToPersonalList(manga_id) => {
            match client.add_to_personal_list(manga_id, ReadingStatus::Pending).await {
                Ok(_) => {
                    let _ = event_tx.send(NetworkEvent::Notice("Added to your list".into()));
                }
                Err(e) => report(&event_tx, "Could not add to your list", e),
            }
        }
        Action::RemoveFromPersonalList(manga_id) => {
            match client.remove_from_personal_list(manga_id).await {
                Ok(_) => reload_personal_list(&client, &event_tx).await,
                Err(e) => report(&event_tx, "Could not remove from your list", e),
            }
        }
        Action::DownloadImage(url) => {
            let bytes = match client.http().get(&url).send().await {
                Ok(resp) => resp.bytes().await,
                Err(e) => Err(e),
            };
            match bytes.map(|b| image::load_from_memory(&b)) {
                Ok(Ok(img)) => {
                    let _ = event_tx.send(NetworkEvent::PageImageDownloaded(url, img));
                }
                Ok(Err(e)) => warn!("could not decode {url}: {e}"),
                Err(e) => warn!("could not download {url}: {e}"),
            }
        }
    }
}

pub async fn run_network_loop(
    client: ApiClient,
    mut action_rx: mpsc::UnboundedReceiver<Action>,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    while let Some(action) = action_rx.recv().await {
        debug!("action {action:?}");
        tokio::spawn(handle(client.clone(), action, event_tx.clone()));
    }
    debug!("network loop finished");
}

pub async fn run_config_watcher(path: Option<PathBuf>, event_tx: mpsc::UnboundedSender<NetworkEvent>) {
    let Some(path) = path else { return };
    let mut last_color = Config::load_from(&path).theme();
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;
        let new_color = Config::load_from(&path).theme();
        if new_color != last_color {
            last_color = new_color;
            if event_tx.send(NetworkEvent::ThemeUpdate(new_color)).is_err() {
                break;
            }
        }
    }
}
