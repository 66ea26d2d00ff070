//! # Parsing de Requests HTTP/1.x
//! src/http/request.rs
//!
//! Este módulo implementa un parser HTTP/1.0 y HTTP/1.1 desde cero.
//!
//! ## Formato de un Request
//!
//! ```text
//! GET /path?param1=value1&param2=value2 HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! User-Agent: curl/7.68.0\r\n
//! \r\n
//! (body opcional, delimitado por Content-Length)
//! ```
//!
//! ## Reglas de validez
//!
//! Un request se considera válido solo si:
//!
//! 1. El método no está vacío (se normaliza a mayúsculas)
//! 2. El path comienza con `/`
//! 3. La versión es `HTTP/1.0` o `HTTP/1.1`
//! 4. Cada línea de header tiene `:` y un nombre no vacío
//!
//! Cualquier header malformado invalida el request completo. Los nombres
//! de header se guardan en minúsculas para búsqueda case-insensitive;
//! claves duplicadas sobreescriben el valor anterior.
//!
//! Transfer-Encoding chunked no está soportado: el body queda delimitado
//! únicamente por Content-Length.

use std::collections::HashMap;

/// Representa un request HTTP/1.x parseado
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP normalizado a mayúsculas (ej: "GET")
    method: String,

    /// Path de la petición con percent-decoding y sin query (ej: "/api/users")
    path: String,

    /// Query parameters parseados y decodificados (ej: {"num": "10"})
    query_params: HashMap<String, String>,

    /// Headers HTTP con nombre en minúsculas (ej: {"host": "localhost:8080"})
    headers: HashMap<String, String>,

    /// Versión HTTP ("HTTP/1.0" o "HTTP/1.1")
    version: String,

    /// Body del request (puede llegar incompleto; ver [`Request::push_body_bytes`])
    body: Vec<u8>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request vacío
    EmptyRequest,

    /// Bytes que no son UTF-8 en la sección de headers
    InvalidEncoding,

    /// Formato inválido de la request line
    InvalidRequestLine,

    /// El path no comienza con '/'
    InvalidPath(String),

    /// Versión HTTP no reconocida
    InvalidHttpVersion(String),

    /// Header sin ':' o con nombre vacío
    InvalidHeader(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyRequest => write!(f, "Empty request"),
            ParseError::InvalidEncoding => write!(f, "Request is not valid UTF-8"),
            ParseError::InvalidRequestLine => write!(f, "Invalid request line format"),
            ParseError::InvalidPath(p) => write!(f, "Path must start with '/': {}", p),
            ParseError::InvalidHttpVersion(v) => write!(f, "Invalid HTTP version: {}", v),
            ParseError::InvalidHeader(h) => write!(f, "Invalid header: {}", h),
        }
    }
}

impl std::error::Error for ParseError {}

impl Request {
    /// Parsea un request HTTP desde bytes
    ///
    /// El buffer debe contener al menos la request line y los headers
    /// completos (hasta `\r\n\r\n`). Los bytes posteriores se toman como
    /// inicio del body; si Content-Length declara más, el caller lee el
    /// resto del socket y lo agrega con [`Request::push_body_bytes`].
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use redunix_server::http::Request;
    ///
    /// let raw = b"GET /api/users?page=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.method(), "GET");
    /// assert_eq!(request.path(), "/api/users");
    /// assert_eq!(request.query_param("page"), Some("1"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        // Separar sección de headers del body: el body puede ser binario,
        // así que solo la sección de headers se valida como UTF-8
        let (head, body) = match find_header_end(buffer) {
            Some(pos) => (&buffer[..pos], buffer[pos + 4..].to_vec()),
            None => (buffer, Vec::new()),
        };

        let head_str = std::str::from_utf8(head).map_err(|_| ParseError::InvalidEncoding)?;

        if head_str.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let mut lines = head_str.split("\r\n");

        // 1. Request line (primera línea)
        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
        let (method, path, query_params, version) = Self::parse_request_line(request_line)?;

        // 2. Headers (resto de líneas hasta la línea vacía)
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            query_params,
            headers,
            version,
            body,
        })
    }

    /// Parsea la request line
    ///
    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(
        line: &str,
    ) -> Result<(String, String, HashMap<String, String>, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        // Debe tener exactamente 3 partes: METHOD PATH VERSION
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = parts[0].to_uppercase();
        if method.is_empty() {
            return Err(ParseError::InvalidRequestLine);
        }

        if !parts[1].starts_with('/') {
            return Err(ParseError::InvalidPath(parts[1].to_string()));
        }
        let (path, query_params) = Self::parse_path_and_query(parts[1]);

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, path, query_params, version))
    }

    /// Separa el path de los query parameters y aplica percent-decoding
    ///
    /// Ejemplo: "/buscar?texto=hola%20mundo"
    /// Retorna: ("/buscar", {"texto": "hola mundo"})
    fn parse_path_and_query(path_with_query: &str) -> (String, HashMap<String, String>) {
        if let Some(query_start) = path_with_query.find('?') {
            let path = url_decode(&path_with_query[..query_start]);
            let query_params = Self::parse_query_string(&path_with_query[query_start + 1..]);
            (path, query_params)
        } else {
            (url_decode(path_with_query), HashMap::new())
        }
    }

    /// Parsea una query string en un HashMap
    ///
    /// Ejemplo: "num=10&texto=hola&rapido=true"
    fn parse_query_string(query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        for param in query.split('&') {
            if param.is_empty() {
                continue;
            }

            if let Some(eq_pos) = param.find('=') {
                let key = url_decode(&param[..eq_pos]);
                let value = url_decode(&param[eq_pos + 1..]);
                params.insert(key, value);
            } else {
                // Parámetro sin valor (ej: "?debug")
                params.insert(url_decode(param), String::new());
            }
        }

        params
    }

    /// Parsea los headers HTTP
    ///
    /// Cada header tiene formato `Name: Value`. Una línea sin `:` o con
    /// nombre vacío hace fallar el parsing completo.
    fn parse_headers<'a, I>(lines: I) -> Result<HashMap<String, String>, ParseError>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut headers = HashMap::new();

        for line in lines {
            // La línea vacía marca el fin de los headers
            if line.trim().is_empty() {
                break;
            }

            let colon_pos = match line.find(':') {
                Some(pos) => pos,
                None => return Err(ParseError::InvalidHeader(line.to_string())),
            };

            let name = line[..colon_pos].trim();
            if name.is_empty() {
                return Err(ParseError::InvalidHeader(line.to_string()));
            }

            let value = line[colon_pos + 1..].trim();
            // Claves en minúsculas; duplicados sobreescriben
            headers.insert(name.to_lowercase(), value.to_string());
        }

        Ok(headers)
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP (siempre en mayúsculas)
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Obtiene el path del request (decodificado, sin query)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene todos los query parameters
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Obtiene un query parameter específico
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Obtiene todos los headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header por nombre (case-insensitive)
    ///
    /// # Ejemplo
    /// ```
    /// use redunix_server::http::Request;
    ///
    /// let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.header("Host"), Some("localhost"));
    /// assert_eq!(request.header("host"), Some("localhost"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Obtiene el body del request
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Obtiene el body como String si es UTF-8 válido
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Content-Length declarado, o 0 si falta o es inválido
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Verifica si el Content-Type declarado es JSON
    pub fn has_json_content_type(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false)
    }

    /// Agrega bytes leídos del socket al body
    ///
    /// Se usa cuando Content-Length declara más de lo que llegó en el
    /// primer read.
    pub fn push_body_bytes(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }
}

/// Busca el final de la sección de headers (`\r\n\r\n`)
pub fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Decodifica percent-encoding (%XX) y '+' como espacio
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        // Secuencia % inválida: se deja tal cual
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/");
        assert_eq!(request.version(), "HTTP/1.1");
        assert!(request.query_params().is_empty());
    }

    #[test]
    fn test_parse_method_is_uppercased() {
        let raw = b"get /index.html HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), "GET");
    }

    #[test]
    fn test_parse_with_query_params() {
        let raw = b"GET /buscar?num=10&texto=hola HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.path(), "/buscar");
        assert_eq!(request.query_param("num"), Some("10"));
        assert_eq!(request.query_param("texto"), Some("hola"));
    }

    #[test]
    fn test_parse_headers_lowercased() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: test\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("host"), Some("localhost:8080"));
        assert_eq!(request.header("HOST"), Some("localhost:8080"));
        assert_eq!(request.headers().get("user-agent").map(|s| s.as_str()), Some("test"));
    }

    #[test]
    fn test_duplicate_header_overwrites() {
        let raw = b"GET / HTTP/1.1\r\nX-Tag: uno\r\nX-Tag: dos\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("x-tag"), Some("dos"));
    }

    #[test]
    fn test_url_decode_percent() {
        let raw = b"GET /reverse?text=hello%20world HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.query_param("text"), Some("hello world"));
    }

    #[test]
    fn test_url_decode_path() {
        let raw = b"GET /archivos/con%20espacio.txt HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.path(), "/archivos/con espacio.txt");
    }

    #[test]
    fn test_header_without_colon_rejected() {
        let raw = b"GET / HTTP/1.1\r\nInvalid-Header\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_header_empty_name_rejected() {
        let raw = b"GET / HTTP/1.1\r\n: valor\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_path_must_start_with_slash() {
        let raw = b"GET relativo HTTP/1.1\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidPath(_))));
    }

    #[test]
    fn test_invalid_version() {
        let raw = b"GET / HTTP/2.0\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
    }

    #[test]
    fn test_empty_request() {
        let result = Request::parse(b"");
        assert!(matches!(result, Err(ParseError::EmptyRequest)));
    }

    #[test]
    fn test_invalid_request_line() {
        let raw = b"GET\r\n\r\n"; // Falta path y version
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidRequestLine)));
    }

    #[test]
    fn test_post_body() {
        let raw = b"POST /api/users HTTP/1.1\r\nContent-Length: 11\r\n\r\nhola server";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), "POST");
        assert_eq!(request.body(), b"hola server");
        assert_eq!(request.content_length(), 11);
    }

    #[test]
    fn test_push_body_bytes() {
        let raw = b"POST /api/users HTTP/1.1\r\nContent-Length: 8\r\n\r\nhola";
        let mut request = Request::parse(raw).unwrap();
        assert_eq!(request.body().len(), 4);

        request.push_body_bytes(b" api");
        assert_eq!(request.body(), b"hola api");
    }

    #[test]
    fn test_json_content_type() {
        let raw =
            b"POST /api/users HTTP/1.1\r\nContent-Type: application/json; charset=utf-8\r\n\r\n{}";
        let request = Request::parse(raw).unwrap();

        assert!(request.has_json_content_type());
    }
}
