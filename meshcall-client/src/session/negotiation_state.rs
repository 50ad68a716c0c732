use std::fmt;

/// Кто отправил первый offer в паре.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

/// Состояние согласования одной сессии.
///
/// Во время повторного согласования (смена треков) наружу остаётся `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    OfferSent,
    RemoteDescribed,
    Connected,
    Closed,
    Failed,
}

/// Что делать, когда offer пришёл при своём неподтверждённом offer.
///
/// Отката локального описания нет: уступающая сторона получает новое
/// соединение.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlareResolution {
    /// Меньший идентификатор. Чужой offer не применяется, ждём answer на свой.
    KeepLocal,
    /// Больший идентификатор при первом согласовании: новое соединение и
    /// answer на чужой offer.
    Yield,
    /// Встречные offer при повторном согласовании. Обе стороны пересоздают
    /// соединение, offer заново отправляет сторона с ролью `Offerer`, а
    /// встречный offer отбрасывается.
    Restart(Role),
}

impl NegotiationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offerer => f.write_str("offerer"),
            Self::Answerer => f.write_str("answerer"),
        }
    }
}
