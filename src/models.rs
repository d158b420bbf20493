use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub type MangaId = u64;
pub type ChapterId = u64;
pub type CommentId = u64;
pub type UserId = u64;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Manga {
    pub id: MangaId,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "autor", default)]
    pub author: Option<String>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "tipo", default)]
    pub kind: Option<String>,
    #[serde(rename = "generos", default, deserialize_with = "list_or_csv")]
    pub genres: Vec<String>,
    #[serde(rename = "estado_publicacion", default)]
    pub publication_status: Option<String>,
    #[serde(rename = "nota_general", default)]
    pub score: Option<f64>,
    #[serde(rename = "url_portada", default)]
    pub cover_url: Option<String>,
    #[serde(rename = "capitulos_totales", default)]
    pub total_chapters: Option<u32>,
    #[serde(rename = "capitulos", default)]
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChapterSummary {
    pub id: ChapterId,
    #[serde(rename = "numero", default)]
    pub number: f64,
    #[serde(rename = "titulo", default)]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Page {
    pub url: String,
    #[serde(rename = "numero", default)]
    pub number: Option<u32>,
}

impl Page {
    /// Absolute image location, prefixing `base_url` for server-relative paths.
    pub fn image_url(&self, base_url: &str) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!("{}{}", base_url.trim_end_matches('/'), self.url)
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum PagesPayload {
    List(Vec<Page>),
    Indexed(BTreeMap<String, Page>),
}

impl PagesPayload {
    fn into_ordered(self) -> Vec<Page> {
        match self {
            PagesPayload::List(pages) => pages,
            PagesPayload::Indexed(map) => {
                let (mut numeric, named): (Vec<_>, Vec<_>) = map
                    .into_iter()
                    .partition(|(key, _)| key.parse::<u64>().is_ok());
                numeric.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
                numeric.into_iter().chain(named).map(|(_, page)| page).collect()
            }
        }
    }
}

#[derive(Deserialize)]
struct RawChapter {
    #[serde(default)]
    id: Option<ChapterId>,
    #[serde(rename = "numero", default)]
    number: Option<f64>,
    #[serde(rename = "titulo", default)]
    title: Option<String>,
    #[serde(default)]
    paginas: Option<PagesPayload>,
    #[serde(default)]
    pages: Option<PagesPayload>,
}

/// One chapter with its pages in reading order.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "RawChapter")]
pub struct Chapter {
    pub id: Option<ChapterId>,
    pub number: Option<f64>,
    pub title: Option<String>,
    pub pages: Vec<Page>,
}

impl From<RawChapter> for Chapter {
    fn from(raw: RawChapter) -> Self {
        let pages = raw
            .paginas
            .or(raw.pages)
            .map(PagesPayload::into_ordered)
            .unwrap_or_default();
        Chapter {
            id: raw.id,
            number: raw.number,
            title: raw.title,
            pages,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(rename = "id_comentario_padre", default)]
    pub parent_id: Option<CommentId>,
    #[serde(rename = "id_usuario", default)]
    pub user_id: Option<UserId>,
    #[serde(rename = "nombre_usuario", default)]
    pub author_name: String,
    #[serde(rename = "texto", default)]
    pub body: String,
    #[serde(rename = "fecha_creacion", default)]
    pub created_at: Option<String>,
    #[serde(rename = "cantidad_likes", alias = "likes", default)]
    pub like_count: u32,
}

impl Comment {
    pub fn created_label(&self) -> String {
        let Some(raw) = self.created_at.as_deref() else {
            return String::new();
        };
        if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
            return ts.format("%Y-%m-%d %H:%M").to_string();
        }
        match chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
            Err(_) => raw.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[serde(rename = "leyendo")]
    Reading,
    #[serde(rename = "completado")]
    Completed,
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "abandonado")]
    Dropped,
    #[serde(rename = "favorito")]
    Favorite,
    #[serde(other)]
    Unknown,
}

impl ReadingStatus {
    pub fn as_query(&self) -> &'static str {
        match self {
            ReadingStatus::Reading => "leyendo",
            ReadingStatus::Completed => "completado",
            ReadingStatus::Pending => "pendiente",
            ReadingStatus::Dropped => "abandonado",
            ReadingStatus::Favorite => "favorito",
            ReadingStatus::Unknown => "desconocido",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadingStatus::Reading => "Reading",
            ReadingStatus::Completed => "Completed",
            ReadingStatus::Pending => "Pending",
            ReadingStatus::Dropped => "Dropped",
            ReadingStatus::Favorite => "Favorite",
            ReadingStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PersonalEntry {
    pub id: MangaId,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "mi_estado", default)]
    pub status: Option<ReadingStatus>,
    #[serde(rename = "mi_puntuacion", default)]
    pub score: Option<f64>,
    #[serde(rename = "mi_comentario", default)]
    pub note: Option<String>,
    #[serde(rename = "id_ultimo_capitulo_leido", default)]
    pub last_read_chapter: Option<ChapterId>,
    #[serde(rename = "capitulos_totales", default)]
    pub total_chapters: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PersonalUpdate {
    #[serde(rename = "id_ultimo_capitulo_leido", skip_serializing_if = "Option::is_none")]
    pub last_read_chapter: Option<ChapterId>,
    #[serde(rename = "estado_lectura", skip_serializing_if = "Option::is_none")]
    pub status: Option<ReadingStatus>,
    #[serde(rename = "puntuacion", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "nombre_usuario", default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    #[serde(rename = "nombre_usuario")]
    pub username: String,
    #[serde(rename = "clave")]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Genres {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Genres>::deserialize(deserializer)? {
        Some(Genres::List(list)) => list,
        Some(Genres::Csv(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(String::from)
            .collect(),
        None => Vec::new(),
    })
}
