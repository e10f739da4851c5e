//! Detaching from the terminal, the PID file, and dropping privileges.

use std::ffi::CString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{FerretError, Result};

/// Detach from the controlling terminal with the double-fork technique.
///
/// Returns in the grandchild only; the original process and the first child
/// exit. Standard input, output, and error are redirected to `/dev/null` and
/// the working directory becomes `/`, so relative paths must already be
/// resolved (see [`DaemonConfig::with_absolute_paths`]). Must be called
/// before any thread is started.
///
/// [`DaemonConfig::with_absolute_paths`]: crate::config::DaemonConfig::with_absolute_paths
pub fn daemonize() -> Result<()> {
    // SAFETY: no other threads exist yet, so fork only duplicates this one.
    match unsafe { libc::fork() } {
        -1 => return Err(io::Error::last_os_error().into()),
        0 => {}
        _ => {
            let mut status: libc::c_int = 0;
            // SAFETY: waiting for the first child, which exits right away.
            unsafe { libc::wait(&mut status) };
            std::process::exit(0);
        }
    }

    // SAFETY: called in the child, which is not a process group leader.
    if unsafe { libc::setsid() } == -1 {
        return Err(io::Error::last_os_error().into());
    }

    // Second fork so the daemon can never reacquire a controlling terminal.
    // SAFETY: as above, single-threaded.
    match unsafe { libc::fork() } {
        -1 => return Err(io::Error::last_os_error().into()),
        0 => {}
        _ => std::process::exit(0),
    }

    // SAFETY: plain descriptor calls on the standard descriptors.
    unsafe {
        let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if null != -1 {
            libc::dup2(null, 0);
            libc::dup2(null, 1);
            libc::dup2(null, 2);
            if null > 2 {
                libc::close(null);
            }
        }
    }
    std::env::set_current_dir("/")?;
    Ok(())
}

/// A file holding the daemon's PID, removed when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::write(&path, format!("{}\n", std::process::id()))?;
        debug!("wrote pid file {}", path.display());
        Ok(PidFile { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("could not remove pid file {}: {e}", self.path.display());
        }
    }
}

fn c_string(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| FerretError::invalid_argument(format!("bad name '{name}'")))
}

fn lookup_user(name: &str) -> Result<(libc::uid_t, libc::gid_t)> {
    let c_name = c_string(name)?;
    // SAFETY: getpwnam returns null or a pointer to static storage, read
    // immediately and not retained.
    let pw = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if pw.is_null() {
        return Err(FerretError::invalid_argument(format!("no such user '{name}'")));
    }
    // SAFETY: checked non-null above.
    let pw = unsafe { &*pw };
    Ok((pw.pw_uid, pw.pw_gid))
}

fn lookup_group(name: &str) -> Result<libc::gid_t> {
    let c_name = c_string(name)?;
    // SAFETY: as for getpwnam.
    let gr = unsafe { libc::getgrnam(c_name.as_ptr()) };
    if gr.is_null() {
        return Err(FerretError::invalid_argument(format!("no such group '{name}'")));
    }
    // SAFETY: checked non-null above.
    Ok(unsafe { (*gr).gr_gid })
}

/// Switch to `user` and `group` when running as root.
///
/// The group is set first, while the process still has the privilege to do
/// so. With a user but no group, the user's primary group is used. Does
/// nothing when not running as root.
pub fn drop_privileges(user: Option<&str>, group: Option<&str>) -> Result<()> {
    // SAFETY: geteuid cannot fail.
    if unsafe { libc::geteuid() } != 0 {
        if user.is_some() || group.is_some() {
            debug!("not root, keeping current user and group");
        }
        return Ok(());
    }

    let user = user.map(lookup_user).transpose()?;
    let gid = match group {
        Some(group) => Some(lookup_group(group)?),
        None => user.map(|(_, gid)| gid),
    };

    if let Some(gid) = gid {
        // SAFETY: plain syscall.
        if unsafe { libc::setgid(gid) } != 0 {
            return Err(io::Error::last_os_error().into());
        }
        info!("running as group {gid}");
    }
    if let Some((uid, _)) = user {
        // SAFETY: plain syscall.
        if unsafe { libc::setuid(uid) } != 0 {
            return Err(io::Error::last_os_error().into());
        }
        info!("running as user {uid}");
    }
    Ok(())
}
