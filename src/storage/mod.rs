// src/storage/mod.rs

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;

// As duas chaves da sessão persistida. São gravadas e removidas juntas:
// quem encontra uma sem a outra deve tratar a sessão como ausente.
pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Armazenamento durável de chave/valor para a sessão (o análogo do
/// `localStorage` do navegador). Síncrono de propósito: a restauração da
/// sessão durante uma navegação não pode suspender.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str);
}

/// Implementação em memória, usada nos testes e quando nenhum caminho de
/// arquivo foi configurado.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// Persistência em um único arquivo JSON (um objeto chave→valor).
/// Cada escrita regrava o arquivo inteiro: o mapa tem duas entradas.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("arquivo de sessão corrompido: {}", path.display()))?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("falha ao ler o arquivo de sessão: {}", path.display())
                });
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("falha ao gravar o arquivo de sessão: {}", self.path.display()))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            // Falha de IO na limpeza não pode impedir o logout.
            if let Err(error) = self.persist(&entries) {
                tracing::warn!("Falha ao limpar o armazenamento de sessão: {:#}", error);
            }
        }
    }
}
