use std::ffi::{CStr, CString};
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::net::SocketAddr;
use std::ptr;

use log::*;

use crate::addr::{Family, RawAddress, TextAddress};

/// Upper bound (exclusive) on the length of the decimal service string.
pub const PORT_BUF_LEN: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Bind intent: an absent host means "any local address".
    Passive,
    /// Connect intent: prefer mapped addresses and configured families.
    Active,
}

impl Mode {
    fn flags(self) -> libc::c_int {
        match self {
            Mode::Passive => libc::AI_PASSIVE,
            Mode::Active => libc::AI_V4MAPPED | libc::AI_ADDRCONFIG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionQuery {
    host: Option<String>,
    port: u16,
    family: Option<Family>,
    mode: Mode,
}

impl ResolutionQuery {
    pub fn passive(port: u16) -> Self {
        ResolutionQuery {
            host: None,
            port,
            family: None,
            mode: Mode::Passive,
        }
    }

    pub fn active(host: impl Into<String>, port: u16) -> Self {
        ResolutionQuery {
            host: Some(host.into()),
            port,
            family: None,
            mode: Mode::Active,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Restricts results to one family; without it every family is requested.
    pub fn with_family(mut self, family: Family) -> Self {
        self.family = Some(family);
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|host| !host.is_empty())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn family(&self) -> Option<Family> {
        self.family
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn hints(&self) -> libc::addrinfo {
        // SAFETY: addrinfo is a plain C struct; all-zero is its documented empty state.
        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = self.family.map_or(libc::AF_UNSPEC, Family::as_raw);
        hints.ai_socktype = libc::SOCK_STREAM;
        hints.ai_protocol = 0;
        hints.ai_flags = self.mode.flags();
        hints
    }

    fn c_host(&self) -> Result<Option<CString>, ResolveError> {
        match (self.host(), self.mode) {
            (Some(host), _) => CString::new(host)
                .map(Some)
                .map_err(|_| ResolveError::InvalidHost(host.to_string())),
            (None, Mode::Passive) => Ok(None),
            (None, Mode::Active) => Err(ResolveError::MissingHost),
        }
    }

    fn c_service(&self) -> Result<CString, ResolveError> {
        if self.port == 0 {
            return Err(ResolveError::InvalidPort(self.port));
        }
        let service = self.port.to_string();
        if service.len() >= PORT_BUF_LEN {
            return Err(ResolveError::InvalidPort(self.port));
        }
        CString::new(service).map_err(|_| ResolveError::InvalidPort(self.port))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("getaddrinfo error: {message} ({code})")]
    Resolution { code: i32, message: String },
    #[error("Host is required for active lookups")]
    MissingHost,
    #[error("Host contains a NUL byte: {0:?}")]
    InvalidHost(String),
    #[error("Invalid port: {0}")]
    InvalidPort(u16),
    #[error("Resolver task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ResolveError {
    fn from_gai(code: libc::c_int) -> Self {
        let message = if code == libc::EAI_SYSTEM {
            io::Error::last_os_error().to_string()
        } else {
            // SAFETY: gai_strerror returns a pointer to a static NUL terminated string.
            unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
                .to_string_lossy()
                .into_owned()
        };
        ResolveError::Resolution { code, message }
    }
}

impl From<ResolveError> for io::Error {
    fn from(value: ResolveError) -> Self {
        let kind = match value {
            ResolveError::Resolution { .. } | ResolveError::Task(_) => io::ErrorKind::Other,
            _ => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, value.to_string())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EndpointCandidate {
    address: RawAddress,
    port: u16,
}

impl EndpointCandidate {
    pub fn family(&self) -> Family {
        self.address.family()
    }

    pub fn address(&self) -> &RawAddress {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn text(&self) -> TextAddress {
        self.address.to_text()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address.ip(), self.port)
    }

    fn from_addrinfo(ai: &libc::addrinfo) -> Option<Self> {
        if ai.ai_addr.is_null() {
            return None;
        }
        let len = ai.ai_addrlen as usize;
        match ai.ai_family {
            libc::AF_INET if len >= mem::size_of::<libc::sockaddr_in>() => {
                // SAFETY: family and length say ai_addr points at a sockaddr_in.
                let sin = unsafe { &*(ai.ai_addr as *const libc::sockaddr_in) };
                Some(EndpointCandidate {
                    address: RawAddress::V4(sin.sin_addr.s_addr.to_ne_bytes()),
                    port: u16::from_be(sin.sin_port),
                })
            }
            libc::AF_INET6 if len >= mem::size_of::<libc::sockaddr_in6>() => {
                // SAFETY: family and length say ai_addr points at a sockaddr_in6.
                let sin6 = unsafe { &*(ai.ai_addr as *const libc::sockaddr_in6) };
                Some(EndpointCandidate {
                    address: RawAddress::V6(sin6.sin6_addr.s6_addr),
                    port: u16::from_be(sin6.sin6_port),
                })
            }
            family => {
                warn!("Skipping candidate with unsupported family {family} (addrlen {len})");
                None
            }
        }
    }
}

impl fmt::Display for EndpointCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.socket_addr(), f)
    }
}

/// Owns a list returned by `getaddrinfo`; freed on drop.
struct AddrInfoList {
    head: *mut libc::addrinfo,
}

impl AddrInfoList {
    fn lookup(
        host: Option<&CStr>,
        service: &CStr,
        hints: &libc::addrinfo,
    ) -> Result<Self, ResolveError> {
        let mut head = ptr::null_mut();
        // SAFETY: host and service are NUL terminated, hints is initialized,
        // and head is only read back on success.
        let code = unsafe {
            libc::getaddrinfo(
                host.map_or(ptr::null(), CStr::as_ptr),
                service.as_ptr(),
                hints,
                &mut head,
            )
        };
        if code != 0 {
            return Err(ResolveError::from_gai(code));
        }
        Ok(AddrInfoList { head })
    }

    fn iter(&self) -> AddrInfoIter<'_> {
        AddrInfoIter {
            cur: self.head,
            _list: PhantomData,
        }
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.head.is_null() {
            // SAFETY: head came from a successful getaddrinfo and is freed once.
            unsafe { libc::freeaddrinfo(self.head) };
        }
    }
}

struct AddrInfoIter<'a> {
    cur: *const libc::addrinfo,
    _list: PhantomData<&'a AddrInfoList>,
}

impl<'a> Iterator for AddrInfoIter<'a> {
    type Item = &'a libc::addrinfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur.is_null() {
            return None;
        }
        // SAFETY: nodes stay valid while the owning AddrInfoList is borrowed.
        let ai = unsafe { &*self.cur };
        self.cur = ai.ai_next;
        Some(ai)
    }
}

/// Blocking lookup of `query` through the platform resolver.
///
/// Candidates come back in the order the resolver produced them. An empty
/// list is a valid answer.
pub fn resolve(query: &ResolutionQuery) -> Result<Vec<EndpointCandidate>, ResolveError> {
    let host = query.c_host()?;
    let service = query.c_service()?;
    let hints = query.hints();

    let list = AddrInfoList::lookup(host.as_deref(), &service, &hints)?;
    let candidates: Vec<_> = list
        .iter()
        .filter_map(EndpointCandidate::from_addrinfo)
        .collect();
    debug!(
        "Resolved {}:{} ({:?}) => {} candidate(s)",
        query.host().unwrap_or("*"),
        query.port,
        query.mode,
        candidates.len()
    );
    Ok(candidates)
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::addr::text_to_address;

    #[test]
    fn passive_any_address() -> Result<(), Box<dyn Error>> {
        let candidates = resolve(&ResolutionQuery::passive(8080))?;
        for candidate in &candidates {
            assert_eq!(candidate.port(), 8080);
            assert!(candidate.address().ip().is_unspecified());
            let text = candidate.text();
            assert_eq!(text_to_address(candidate.family(), &text)?, *candidate.address());
        }
        Ok(())
    }

    #[test]
    fn passive_family_hint() -> Result<(), Box<dyn Error>> {
        let candidates = resolve(&ResolutionQuery::passive(8080).with_family(Family::Inet))?;
        assert!(!candidates.is_empty());
        for candidate in &candidates {
            assert_eq!(candidate.family(), Family::Inet);
            assert_eq!(candidate.text().as_str(), "0.0.0.0");
        }
        Ok(())
    }

    #[test]
    fn passive_empty_host_means_any() -> Result<(), Box<dyn Error>> {
        let query = ResolutionQuery::passive(8080).with_host("");
        assert_eq!(query.host(), None);
        resolve(&query)?;
        Ok(())
    }

    #[test]
    fn active_loopback() -> Result<(), Box<dyn Error>> {
        let candidates = resolve(&ResolutionQuery::active("127.0.0.1", 443))?;
        let loopback = candidates
            .iter()
            .find(|c| c.text().as_str() == "127.0.0.1")
            .ok_or("no 127.0.0.1 candidate")?;
        assert_eq!(loopback.port(), 443);
        assert_eq!(loopback.socket_addr().to_string(), "127.0.0.1:443");
        Ok(())
    }

    #[test]
    fn active_malformed_host() {
        let err = resolve(&ResolutionQuery::active("..", 443)).unwrap_err();
        match err {
            ResolveError::Resolution { code, message } => {
                assert_ne!(code, 0);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_failures() {
        let err = resolve(&ResolutionQuery::active("", 443)).unwrap_err();
        assert!(matches!(err, ResolveError::MissingHost));

        let err = resolve(&ResolutionQuery::active("local\0host", 443)).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidHost(_)));

        let err = resolve(&ResolutionQuery::passive(0)).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPort(0)));

        let io_err = io::Error::from(ResolveError::MissingHost);
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn service_string() -> Result<(), Box<dyn Error>> {
        let service = ResolutionQuery::passive(u16::MAX).c_service()?;
        assert_eq!(service.as_bytes(), b"65535");
        assert!(service.as_bytes().len() < PORT_BUF_LEN);
        Ok(())
    }

    #[test]
    fn candidates_keep_resolver_order() -> Result<(), Box<dyn Error>> {
        let query = ResolutionQuery::passive(8080);
        let service = query.c_service()?;
        let list = AddrInfoList::lookup(None, &service, &query.hints())?;
        let families: Vec<_> = list.iter().map(|ai| ai.ai_family).collect();
        drop(list);

        let resolved: Vec<_> = resolve(&query)?
            .iter()
            .map(|c| c.family().as_raw())
            .collect();
        assert_eq!(resolved, families);
        Ok(())
    }
}
