//! 롤링 시그널 히스토리.
//!
//! 파이프라인 객체가 소유하는 유계 링 버퍼입니다. 전역 가변 상태 대신
//! 명시적으로 주입되며, 관측용 통계(액션 빈도, 연속성)를 제공합니다.
//! 통계는 제어 흐름에 사용하지 않습니다.

use std::collections::VecDeque;

use perp_core::{SignalAction, TradeSignal};

/// 기본 보존 개수.
pub const DEFAULT_CAPACITY: usize = 30;

/// 유계 롤링 시그널 히스토리.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    capacity: usize,
    entries: VecDeque<TradeSignal>,
}

impl SignalHistory {
    /// 지정 용량으로 생성.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// 시그널 추가. 용량 초과 시 가장 오래된 항목 제거.
    pub fn push(&mut self, signal: TradeSignal) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(signal);
    }

    /// 보존 중인 시그널 수.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 가장 최근 시그널.
    pub fn last(&self) -> Option<&TradeSignal> {
        self.entries.back()
    }

    /// 오래된 것부터 순회.
    pub fn iter(&self) -> impl Iterator<Item = &TradeSignal> {
        self.entries.iter()
    }

    /// 트레일링 윈도우 내 특정 액션의 빈도 (출현 횟수, 전체 수).
    pub fn action_frequency(&self, action: SignalAction) -> (usize, usize) {
        let count = self
            .entries
            .iter()
            .filter(|signal| signal.action == action)
            .count();
        (count, self.entries.len())
    }

    /// 최근 3개 액션이 모두 동일한지 여부.
    pub fn last_three_identical(&self) -> bool {
        if self.entries.len() < 3 {
            return false;
        }
        let mut recent = self.entries.iter().rev().take(3);
        let first = match recent.next() {
            Some(signal) => signal.action,
            None => return false,
        };
        recent.all(|signal| signal.action == first)
    }
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use perp_core::Confidence;
    use rust_decimal_macros::dec;

    use super::*;

    fn signal(action: SignalAction) -> TradeSignal {
        TradeSignal::new(
            action,
            Confidence::Medium,
            "테스트",
            dec!(98),
            dec!(102),
            Utc::now(),
        )
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = SignalHistory::new(3);
        history.push(signal(SignalAction::Buy));
        history.push(signal(SignalAction::Sell));
        history.push(signal(SignalAction::Hold));
        history.push(signal(SignalAction::Close));

        assert_eq!(history.len(), 3);
        // 가장 오래된 Buy가 밀려남
        assert_eq!(history.iter().next().unwrap().action, SignalAction::Sell);
    }

    #[test]
    fn test_action_frequency() {
        let mut history = SignalHistory::new(10);
        history.push(signal(SignalAction::Buy));
        history.push(signal(SignalAction::Buy));
        history.push(signal(SignalAction::Hold));

        assert_eq!(history.action_frequency(SignalAction::Buy), (2, 3));
        assert_eq!(history.action_frequency(SignalAction::Sell), (0, 3));
    }

    #[test]
    fn test_last_three_identical() {
        let mut history = SignalHistory::new(10);
        history.push(signal(SignalAction::Buy));
        history.push(signal(SignalAction::Buy));
        assert!(!history.last_three_identical()); // 2개뿐

        history.push(signal(SignalAction::Buy));
        assert!(history.last_three_identical());

        history.push(signal(SignalAction::Sell));
        assert!(!history.last_three_identical());
    }
}
