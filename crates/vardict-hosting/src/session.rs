//! 会话：字典与上报连接的一次性装配。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 预处理器在首次遇到变量宏时才需要字典；没有使用变量的翻译单元不应付出映射与连接的代价；
//! - 装配失败（句柄缺失、字典损坏）意味着构建环境不可信，必须让上层终止进程，
//!   而不是带着残缺状态继续产出错误的依赖图。
//!
//! ## 逻辑（How）
//! - [`SessionBootstrap`] 抽象“如何取得字典与接收端”，生产实现 [`EnvBootstrap`] 读取环境变量中的描述符；
//! - [`Session`] 以 `spin::Once::try_call_once` 包装装配过程：并发首调只有一个线程执行装配，
//!   其余线程自旋等待同一结果；装配失败不会缓存，错误原样返回；
//! - 会话记录正在执行装配的线程；该线程在装配过程中再次进入同一会话的初始化时，
//!   返回 [`FatalError::Reentrant`] 而不是自旋死锁。其它会话不受影响。
//!
//! ## 契约（What）
//! - `ensure_initialized` 幂等：成功后再次调用不会重复加载；
//! - 三个宏入口先确保初始化，再委托 [`VariableResolver`]；
//! - 上报失败在核心层记录日志后吞掉，不会改变解析结果。

use std::fmt;
use std::os::fd::{BorrowedFd, RawFd};
use std::thread::{self, ThreadId};

use spin::{Mutex, Once};
use thiserror::Error;
use tracing::info;
use vardict_core::{AccessSink, Dictionary, DictionaryError, ResolvedVariable, VariableResolver};
use vardict_transport::{ReporterError, SocketReporter};

use crate::config::{ConfigError, HandleConfig, process_env};

/// 致命错误码。
pub mod codes {
    /// 装配过程中同一线程再次请求同一会话的初始化。
    pub const SESSION_REENTRANT: &str = "vardict.session.reentrant";
}

/// 会话装配失败，需由宿主终止进程。
#[derive(Debug, Error)]
pub enum FatalError {
    /// 句柄配置缺失或非法。
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// 字典无法加载或格式非法。
    #[error("dictionary: {0}")]
    Dictionary(#[from] DictionaryError),
    /// 上报套接字不可用。
    #[error("reporter: {0}")]
    Reporter(#[from] ReporterError),
    /// 装配过程中再次进入同一会话的初始化。
    #[error("session initialization re-entered by its initializing thread")]
    Reentrant,
}

impl FatalError {
    /// 出错的子系统名，用于终止前的诊断输出。
    pub fn subsystem(&self) -> &'static str {
        match self {
            FatalError::Config(_) => "config",
            FatalError::Dictionary(_) => "dictionary",
            FatalError::Reporter(_) => "reporter",
            FatalError::Reentrant => "session",
        }
    }

    /// 返回底层错误的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            FatalError::Config(err) => err.code(),
            FatalError::Dictionary(err) => err.code(),
            FatalError::Reporter(err) => err.code(),
            FatalError::Reentrant => codes::SESSION_REENTRANT,
        }
    }
}

/// 会话装配的依赖来源。
///
/// # 契约（What）
/// - 两个方法各在首次初始化时被调用至多一次（装配失败后重试除外）；
/// - 先加载字典，再建立接收端，与协调器交付句柄的顺序无关。
pub trait SessionBootstrap: Send + Sync {
    /// 取得只读字典。
    fn load_dictionary(&self) -> Result<Dictionary, FatalError>;

    /// 取得访问事件接收端。
    fn connect_reporter(&self) -> Result<Box<dyn AccessSink>, FatalError>;
}

/// 从进程环境变量读取描述符的生产装配。
#[derive(Clone, Debug, Default)]
pub struct EnvBootstrap {
    config: HandleConfig,
}

impl EnvBootstrap {
    /// 使用自定义变量名。
    pub fn new(config: HandleConfig) -> Self {
        Self { config }
    }

    /// 当前配置。
    pub fn config(&self) -> &HandleConfig {
        &self.config
    }
}

impl SessionBootstrap for EnvBootstrap {
    fn load_dictionary(&self) -> Result<Dictionary, FatalError> {
        let fd = self.config.dictionary_fd(process_env)?;
        Ok(with_inherited_fd(fd, Dictionary::from_fd)?)
    }

    fn connect_reporter(&self) -> Result<Box<dyn AccessSink>, FatalError> {
        let fd = self.config.reporter_fd(process_env)?;
        Ok(Box::new(with_inherited_fd(fd, SocketReporter::from_fd)?))
    }
}

/// 在闭包内借用协调器交来的描述符。
///
/// `fd` 已由 [`HandleConfig`] 校验为正数；协调器保证它在进程生命周期内保持打开，
/// 加载方只在借用期间复制一份。
#[allow(unsafe_code)]
fn with_inherited_fd<T>(fd: RawFd, load: impl FnOnce(BorrowedFd<'_>) -> T) -> T {
    debug_assert!(fd > 0);
    // SAFETY: 描述符为正且由协调器在进程生命周期内持有，不会在借用期间关闭。
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    load(borrowed)
}

struct SessionState {
    dictionary: Dictionary,
    sink: Box<dyn AccessSink>,
}

/// 装配期间占用 `initializer` 槽位，离开作用域（含出错返回）时释放。
struct InitClaim<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> InitClaim<'a> {
    fn new(slot: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *slot.lock() = Some(thread);
        Self { slot }
    }
}

impl Drop for InitClaim<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// 持有字典与接收端的会话。
pub struct Session<B = EnvBootstrap> {
    bootstrap: B,
    state: Once<SessionState>,
    initializer: Mutex<Option<ThreadId>>,
}

impl Session<EnvBootstrap> {
    /// 以默认环境变量名构造尚未初始化的会话。
    pub fn from_env() -> Self {
        Self::new(EnvBootstrap::default())
    }
}

impl<B: SessionBootstrap> Session<B> {
    /// 构造尚未初始化的会话。
    pub const fn new(bootstrap: B) -> Self {
        Self {
            bootstrap,
            state: Once::new(),
            initializer: Mutex::new(None),
        }
    }

    /// 确保字典与接收端已就绪。
    pub fn ensure_initialized(&self) -> Result<(), FatalError> {
        self.state().map(|_| ())
    }

    /// 是否已完成初始化。
    pub fn is_initialized(&self) -> bool {
        self.state.is_completed()
    }

    /// 已加载的字典；未初始化时返回 `None`，不会触发装配。
    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.state.get().map(|state| &state.dictionary)
    }

    /// 初始化后返回绑定当前字典与接收端的解析器。
    pub fn resolver(&self) -> Result<VariableResolver<'_>, FatalError> {
        let state = self.state()?;
        Ok(VariableResolver::new(&state.dictionary, state.sink.as_ref()))
    }

    /// 值宏入口。
    pub fn set_variable_macro(
        &self,
        name: &[u8],
        n_is_zero: bool,
    ) -> Result<ResolvedVariable, FatalError> {
        Ok(self.resolver()?.set_variable_macro(name, n_is_zero))
    }

    /// 开关宏入口。
    pub fn set_boolean_macro(&self, name: &[u8]) -> Result<ResolvedVariable, FatalError> {
        Ok(self.resolver()?.set_boolean_macro(name))
    }

    /// 条件宏入口。
    pub fn set_conditional_macro(
        &self,
        name: &[u8],
        invert: bool,
    ) -> Result<ResolvedVariable, FatalError> {
        Ok(self.resolver()?.set_conditional_macro(name, invert))
    }

    fn state(&self) -> Result<&SessionState, FatalError> {
        if let Some(state) = self.state.get() {
            return Ok(state);
        }
        let current = thread::current().id();
        if *self.initializer.lock() == Some(current) {
            return Err(FatalError::Reentrant);
        }
        self.state.try_call_once(|| {
            let _claim = InitClaim::new(&self.initializer, current);
            let dictionary = self.bootstrap.load_dictionary()?;
            let sink = self.bootstrap.connect_reporter()?;
            info!(entries = dictionary.len(), "vardict session initialized");
            Ok(SessionState { dictionary, sink })
        })
    }
}

impl<B> fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("initialized", &self.state.is_completed())
            .finish_non_exhaustive()
    }
}
