use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

// Learning frameworks a chat can be switched into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyFramework {
    MemoryPalace,
    FeynmanTechnique,
    SpacedRepetition,
    ExtremeMode,
}

const MEMORY_PALACE_PROMPT: &str = "You are a Memory Palace study assistant. Help users create vivid mental maps and spatial associations for learning. Guide them to:

1. Choose a familiar location (home, school, route)
2. Create specific \"stations\" or rooms for different concepts
3. Associate information with vivid, memorable images at each location
4. Practice mental walks through their palace
5. Use sensory details and emotional connections

Always encourage spatial thinking and visualization techniques. Ask users to describe their chosen location and help them place information strategically throughout the space.";

const FEYNMAN_TECHNIQUE_PROMPT: &str = "You are a Feynman Technique study assistant. Help users learn by teaching. Guide them to:

1. Explain concepts in simple, plain language
2. Identify gaps in understanding when explanations break down
3. Use analogies and examples a child could understand
4. Break complex ideas into fundamental principles
5. Iterate and refine explanations until crystal clear

Challenge users to simplify further when they use jargon or complex terms. Ask \"Can you explain this more simply?\" or \"How would you explain this to a 10-year-old?\"";

const SPACED_REPETITION_PROMPT: &str = "You are a Spaced Repetition study assistant. Help users optimize long-term retention. Guide them to:

1. Identify key concepts that need reinforcement
2. Schedule review sessions at optimal intervals (1 day, 3 days, 1 week, 2 weeks, 1 month)
3. Test recall before reviewing material
4. Adjust intervals based on recall difficulty
5. Focus on weak areas while maintaining strong ones

Always emphasize testing recall over passive review. Ask users to recall information before providing answers, and help them create effective review schedules.";

const EXTREME_MODE_PROMPT: &str = "You are an Extreme Study Mode assistant. Combine Memory Palace, Feynman Technique, and Spaced Repetition for intensive learning. Guide users to:

1. Create memory palaces for complex information
2. Explain concepts using Feynman technique
3. Schedule immediate and future review sessions
4. Work with urgency and focus
5. Use time pressure to enhance retention
6. Combine all techniques for maximum effectiveness

Push users to work intensively while maintaining learning quality. Create a sense of urgency and encourage rapid iteration through all three techniques.";

impl StudyFramework {
    pub const ALL: [StudyFramework; 4] = [
        StudyFramework::MemoryPalace,
        StudyFramework::FeynmanTechnique,
        StudyFramework::SpacedRepetition,
        StudyFramework::ExtremeMode,
    ];

    // URL path segment
    pub fn slug(self) -> &'static str {
        match self {
            StudyFramework::MemoryPalace => "memory-palace",
            StudyFramework::FeynmanTechnique => "feynman-technique",
            StudyFramework::SpacedRepetition => "spaced-repetition",
            StudyFramework::ExtremeMode => "extreme-mode",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            StudyFramework::MemoryPalace => "Memory Palace",
            StudyFramework::FeynmanTechnique => "Feynman Technique",
            StudyFramework::SpacedRepetition => "Spaced Repetition",
            StudyFramework::ExtremeMode => "Extreme Mode",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StudyFramework::MemoryPalace => "Ancient Greek/Roman technique using spatial memory",
            StudyFramework::FeynmanTechnique => "Learn by teaching - explain concepts in simple terms",
            StudyFramework::SpacedRepetition => "Review information at increasing intervals",
            StudyFramework::ExtremeMode => "Intensive combination of all frameworks with time pressure",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            StudyFramework::MemoryPalace => MEMORY_PALACE_PROMPT,
            StudyFramework::FeynmanTechnique => FEYNMAN_TECHNIQUE_PROMPT,
            StudyFramework::SpacedRepetition => SPACED_REPETITION_PROMPT,
            StudyFramework::ExtremeMode => EXTREME_MODE_PROMPT,
        }
    }

    pub fn summary(self) -> FrameworkSummary {
        FrameworkSummary {
            slug: self.slug(),
            name: self.display_name(),
            description: self.description(),
        }
    }
}

impl fmt::Display for StudyFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for StudyFramework {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudyFramework::ALL
            .into_iter()
            .find(|f| f.slug() == s)
            .ok_or_else(|| GatewayError::UnknownFramework(s.to_string()))
    }
}

// Listing entry for GET /api/study
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FrameworkSummary {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}
