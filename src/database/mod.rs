use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::{collections::HashMap, sync::Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{lost_flowers, Bouquets, LostFlowers, UserDirectory};

/// Один из трёх JSON-документов с данными магазина
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Bouquets,
    LostFlowers,
    Users,
}

impl Document {
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Bouquets => "bouquets.json",
            Document::LostFlowers => "lost_flowers.json",
            Document::Users => "admin_users.json",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {document}: {source}")]
    Read {
        document: Document,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {document}: {source}")]
    Write {
        document: Document,
        #[source]
        source: io::Error,
    },
    #[error("{document} is not valid JSON: {source}")]
    Malformed {
        document: Document,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize {document}: {source}")]
    Serialize {
        document: Document,
        #[source]
        source: serde_json::Error,
    },
}

/// Где физически лежат документы.
///
/// `read` возвращает `None`, если документа ещё нет.
pub trait Backend: Send + Sync {
    fn read(&self, document: Document) -> io::Result<Option<String>>;
    fn write(&self, document: Document, contents: &str) -> io::Result<()>;
}

/// Файлы в каталоге данных. Запись перезаписывает файл целиком, без временного файла.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, document: Document) -> PathBuf {
        self.dir.join(document.file_name())
    }
}

impl Backend for FileBackend {
    fn read(&self, document: Document) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(document)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, document: Document, contents: &str) -> io::Result<()> {
        fs::write(self.path(document), contents)
    }
}

/// Хранилище в памяти, для тестов без файловой системы
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<Mutex<HashMap<Document, String>>>,
}

#[cfg(test)]
impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, document: Document, contents: &str) -> Self {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(document, contents.to_string());
        }
        self
    }

    pub fn document(&self, document: Document) -> Option<String> {
        self.documents
            .lock()
            .ok()
            .and_then(|documents| documents.get(&document).cloned())
    }
}

#[cfg(test)]
impl Backend for MemoryBackend {
    fn read(&self, document: Document) -> io::Result<Option<String>> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| io::Error::other("memory backend lock poisoned"))?;
        Ok(documents.get(&document).cloned())
    }

    fn write(&self, document: Document, contents: &str) -> io::Result<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| io::Error::other("memory backend lock poisoned"))?;
        documents.insert(document, contents.to_string());
        Ok(())
    }
}

fn load_document<T>(backend: &dyn Backend, document: Document) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let contents = backend
        .read(document)
        .map_err(|source| StoreError::Read { document, source })?;

    match contents {
        Some(text) if !text.trim().is_empty() => serde_json::from_str(&text)
            .map_err(|source| StoreError::Malformed { document, source }),
        _ => {
            log::info!("📄 {} not found, starting empty", document);
            Ok(T::default())
        }
    }
}

fn save_document<T: Serialize>(
    backend: &dyn Backend,
    document: Document,
    value: &T,
) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|source| StoreError::Serialize { document, source })?;
    backend
        .write(document, &text)
        .map_err(|source| StoreError::Write { document, source })?;
    log::debug!("💾 {} saved ({} bytes)", document, text.len());
    Ok(())
}

/// Все данные магазина в памяти плюс место, куда их сохранять.
///
/// Изменения делаются прямо в полях, после чего вызывается нужный `save_*`.
pub struct Records {
    backend: Arc<dyn Backend>,
    pub bouquets: Bouquets,
    pub lost_flowers: LostFlowers,
    pub users: UserDirectory,
}

impl Records {
    pub fn load(backend: Arc<dyn Backend>) -> Result<Self, StoreError> {
        let bouquets: Bouquets = load_document(backend.as_ref(), Document::Bouquets)?;
        let lost_flowers: LostFlowers = load_document(backend.as_ref(), Document::LostFlowers)?;
        let users: UserDirectory = load_document(backend.as_ref(), Document::Users)?;

        log::info!(
            "📦 Loaded {} bouquets, {} lost flower reports, {} admins, {} users",
            bouquets.values().map(|b| b.len()).sum::<usize>(),
            lost_flowers::event_count(&lost_flowers),
            users.admins.len(),
            users.users.len()
        );

        Ok(Self {
            backend,
            bouquets,
            lost_flowers,
            users,
        })
    }

    pub fn save_bouquets(&self) -> Result<(), StoreError> {
        save_document(self.backend.as_ref(), Document::Bouquets, &self.bouquets)
    }

    pub fn save_lost_flowers(&self) -> Result<(), StoreError> {
        save_document(self.backend.as_ref(), Document::LostFlowers, &self.lost_flowers)
    }

    pub fn save_users(&self) -> Result<(), StoreError> {
        save_document(self.backend.as_ref(), Document::Users, &self.users)
    }
}
