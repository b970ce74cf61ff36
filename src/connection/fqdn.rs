//! Local host name lookup
//!
//! Mirrors what `getfqdn` does on a typical Linux box: take the kernel host
//! name and ask the resolver for its canonical name.

/// Fully-qualified name of the local machine, if it can be determined
pub fn local_fqdn() -> Option<String> {
    let host = hostname()?;
    canonical_name(&host).or(Some(host))
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = vec![0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    buf.truncate(end);
    let name = String::from_utf8_lossy(&buf).into_owned();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(unix)]
fn canonical_name(host: &str) -> Option<String> {
    use std::ffi::{CStr, CString};

    let c_host = CString::new(host).ok()?;
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_flags = libc::AI_CANONNAME;
    hints.ai_family = libc::AF_UNSPEC;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), std::ptr::null(), &hints, &mut res) };
    if rc != 0 || res.is_null() {
        return None;
    }

    let name = unsafe {
        let canon = (*res).ai_canonname;
        if canon.is_null() {
            None
        } else {
            Some(CStr::from_ptr(canon).to_string_lossy().into_owned())
        }
    };
    unsafe { libc::freeaddrinfo(res) };

    name.filter(|n| !n.is_empty())
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    None
}

#[cfg(not(unix))]
fn canonical_name(_host: &str) -> Option<String> {
    None
}
