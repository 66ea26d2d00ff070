//! # Servido de Archivos Estáticos
//! src/router/files.rs
//!
//! Resuelve paths dentro del document root, con acceso de solo lectura.
//! Un path que termina en `/` resuelve a `index.html` dentro del
//! directorio; los paths con segmentos `..` se rechazan siempre.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Handler de archivos estáticos con tabla de MIME types
pub struct FileHandler {
    document_root: PathBuf,
    mime_types: HashMap<&'static str, &'static str>,
}

impl FileHandler {
    pub fn new<P: AsRef<Path>>(document_root: P) -> Self {
        let mut mime_types = HashMap::new();

        // Tipos comunes
        mime_types.insert("html", "text/html");
        mime_types.insert("htm", "text/html");
        mime_types.insert("css", "text/css");
        mime_types.insert("js", "application/javascript");
        mime_types.insert("json", "application/json");
        mime_types.insert("txt", "text/plain");
        mime_types.insert("xml", "application/xml");

        // Imágenes
        mime_types.insert("png", "image/png");
        mime_types.insert("jpg", "image/jpeg");
        mime_types.insert("jpeg", "image/jpeg");
        mime_types.insert("gif", "image/gif");
        mime_types.insert("svg", "image/svg+xml");
        mime_types.insert("ico", "image/x-icon");

        // Otros
        mime_types.insert("pdf", "application/pdf");
        mime_types.insert("zip", "application/zip");

        Self {
            document_root: document_root.as_ref().to_path_buf(),
            mime_types,
        }
    }

    /// Resuelve un path de request a un path de archivo bajo el docroot
    ///
    /// Retorna `None` si el path contiene segmentos `..`.
    pub fn resolve_path(&self, requested_path: &str) -> Option<PathBuf> {
        // Rechazar escapes del docroot antes de tocar el filesystem
        if requested_path.split('/').any(|segment| segment == "..") {
            return None;
        }

        let mut path = requested_path.to_string();
        if path.ends_with('/') {
            path.push_str("index.html");
        }

        Some(self.document_root.join(path.trim_start_matches('/')))
    }

    /// Verifica que el path resuelva a un archivo regular existente
    pub fn file_exists(&self, requested_path: &str) -> bool {
        match self.resolve_path(requested_path) {
            Some(full_path) => full_path.is_file(),
            None => false,
        }
    }

    /// Lee el archivo completo como bytes
    pub fn read_file(&self, requested_path: &str) -> io::Result<Vec<u8>> {
        let full_path = self.resolve_path(requested_path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::PermissionDenied, "path escapes document root")
        })?;
        std::fs::read(full_path)
    }

    /// MIME type según la extensión del archivo
    ///
    /// Un path que termina en `/` se evalúa como su `index.html`.
    pub fn mime_type(&self, requested_path: &str) -> &'static str {
        let effective = if requested_path.ends_with('/') {
            "index.html"
        } else {
            requested_path
        };

        let extension = effective
            .rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/'))
            .map(|ext| ext.to_lowercase());

        match extension {
            Some(ext) => self.mime_types.get(ext.as_str()).copied().unwrap_or("application/octet-stream"),
            None => "application/octet-stream",
        }
    }

    /// Document root configurado
    pub fn document_root(&self) -> &Path {
        &self.document_root
    }
}
