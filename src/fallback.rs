use crate::models::chat::ChatMode;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Distress,
    Relationship,
    Health,
    WorkSchool,
    Capability,
    Weather,
    Creative,
    Learning,
    Coding,
    Greeting,
    Sadness,
    Anxiety,
    Anger,
    Overwhelm,
    Positive,
    Default,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Distress => "distress",
            Category::Relationship => "relationship",
            Category::Health => "health",
            Category::WorkSchool => "work_school",
            Category::Capability => "capability",
            Category::Weather => "weather",
            Category::Creative => "creative",
            Category::Learning => "learning",
            Category::Coding => "coding",
            Category::Greeting => "greeting",
            Category::Sadness => "sadness",
            Category::Anxiety => "anxiety",
            Category::Anger => "anger",
            Category::Overwhelm => "overwhelm",
            Category::Positive => "positive",
            Category::Default => "default",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword syntax: a plain word matches a whole word, `stem*` matches any word
/// starting with `stem`, and anything containing a space matches as a phrase.
struct Rule {
    category: Category,
    keywords: &'static [&'static str],
    replies: &'static [&'static str],
}

// Evaluated top to bottom, first match wins. Distress stays first.
const GENERAL_RULES: &[Rule] = &[
    Rule {
        category: Category::Distress,
        keywords: &[
            "anxious", "anxiety", "worried", "worry*", "stress*", "sad", "depress*", "lonely",
            "scared", "afraid", "panic*", "overwhelm*", "upset", "crying", "hopeless", "suicid*",
            "self harm", "kill myself", "end my life", "can't cope", "feel down", "feeling down",
        ],
        replies: &[
            "I'm really sorry you're going through this. Your feelings are valid, and you don't have to carry them alone. Would you like to tell me a bit more about what's on your mind?",
            "That sounds hard, and I'm glad you said something. Try taking a slow, deep breath with me. If things ever feel unsafe, please reach out to someone you trust or a local crisis line right away.",
            "I'm here to listen. It's okay to not be okay sometimes. What has been weighing on you the most today?",
        ],
    },
    Rule {
        category: Category::Relationship,
        keywords: &[
            "relationship*", "boyfriend", "girlfriend", "partner", "husband", "wife", "breakup",
            "broke up", "crush", "dating", "friend*", "family", "parent*", "mom", "dad",
        ],
        replies: &[
            "Relationships can be complicated. I'm having some connectivity issues right now, but I'd still like to hear what's going on. How are you feeling about it?",
            "It sounds like someone important is on your mind. Want to walk me through what happened? Sometimes putting it into words helps.",
        ],
    },
    Rule {
        category: Category::Health,
        keywords: &[
            "sick", "ill", "headache", "pain", "doctor", "health*", "sleep*", "insomnia", "tired",
            "exercise", "diet", "fever", "medicine", "hurts", "not feeling well",
        ],
        replies: &[
            "I'm sorry you're not feeling your best. I can't give medical advice, but rest, water and checking in with a doctor if it persists are good places to start. How long has this been going on?",
            "Taking care of your body matters. If anything feels serious, please contact a medical professional. In the meantime, would some general wellness tips help?",
        ],
    },
    Rule {
        category: Category::WorkSchool,
        keywords: &[
            "work*", "job", "boss", "coworker*", "career", "office", "school", "exam*",
            "homework", "teacher", "deadline*", "interview*", "assignment*", "grade*", "college",
            "university",
        ],
        replies: &[
            "Work and school can pile up fast. I'm running on backup mode right now, but let's break it down: what's the most urgent thing on your plate?",
            "That sounds like a lot to juggle. Would it help to make a quick plan together, starting with whatever is due first?",
        ],
    },
    Rule {
        category: Category::Capability,
        keywords: &[
            "what can you do", "who are you", "what are you", "what do you do", "your name",
            "are you a bot", "are you real", "how do you work",
        ],
        replies: &[
            "I'm Lumi, your friendly AI assistant! I can chat, help you think through problems, brainstorm ideas, explain topics and keep a mood diary with you. My main AI system is having trouble right now, so my answers may be simpler than usual.",
        ],
    },
    Rule {
        category: Category::Weather,
        keywords: &["weather", "temperature", "rain*", "sunny", "snow*", "forecast"],
        replies: &[
            "I can't check real-time weather, but I can help you prepare! What's your location? I can suggest what to typically expect this time of year and recommend outfit choices.",
            "While I don't have live weather data, I can give you seasonal advice! Are you planning outdoor activities? I can suggest backup plans for different weather scenarios.",
            "I can't access current weather, but I can help you stay prepared! Try your phone's weather app for live updates. Need tips for dressing for unpredictable weather?",
            "No live weather access here, but let me help differently! What are you planning? I can suggest weather-appropriate activities or help you prepare for different conditions.",
        ],
    },
    Rule {
        category: Category::Creative,
        keywords: &["idea*", "creative", "brainstorm*", "design*", "story", "poem", "draw*"],
        replies: &[
            "I love creative challenges! Even with my current connectivity issues, I can help brainstorm. What kind of project or creative challenge are you working on? Let's think through some approaches together!",
        ],
    },
    Rule {
        category: Category::Learning,
        keywords: &["learn*", "study*", "course*", "tutorial*", "teach*"],
        replies: &[
            "Learning is awesome! While I'm having some connectivity issues, I can still help plan your learning journey. What subject interests you? I can suggest effective study strategies and resource types to look for.",
        ],
    },
    Rule {
        category: Category::Coding,
        keywords: &[
            "code", "coding", "program*", "debug*", "bug", "error*", "compile*", "function",
            "python", "javascript", "rust",
        ],
        replies: &[
            "I'm experiencing connectivity issues with my main AI system, but I love helping with coding! What programming language or specific challenge are you working on? I can share some general debugging approaches and best practices.",
        ],
    },
    Rule {
        category: Category::Greeting,
        keywords: &[
            "hello", "hi", "hey", "howdy", "greetings", "good morning", "good afternoon",
            "good evening",
        ],
        replies: &[
            "Hello! I'm Lumi, your AI assistant. I'm currently experiencing some connectivity issues with my advanced features, but I'm still here to help however I can! What's on your mind?",
            "Hey there! My main AI system is a little sleepy right now, but I'm happy to chat. How is your day going?",
        ],
    },
];

const GENERAL_DEFAULT: &[&str] = &[
    "That's interesting! I'm having some connectivity issues with my main AI system right now, but I'd still love to help. Could you tell me more about what you're trying to accomplish? Maybe I can offer some guidance or alternative approaches!",
];

const DIARY_RULES: &[Rule] = &[
    Rule {
        category: Category::Sadness,
        keywords: &["sad", "depress*", "down", "unhappy", "cry*", "lonely", "heartbroken"],
        replies: &[
            "I'm here to listen and support you through these difficult feelings. It's okay to feel sad sometimes - your emotions are valid. Would you like to talk more about what's contributing to these feelings?",
        ],
    },
    Rule {
        category: Category::Anxiety,
        keywords: &[
            "anxious", "anxiety", "worried", "worry*", "stress*", "nervous", "panic*", "scared",
            "afraid",
        ],
        replies: &[
            "Anxiety can feel overwhelming, but you're not alone. Would you like to share what's on your mind?",
        ],
    },
    Rule {
        category: Category::Anger,
        keywords: &["angry", "frustrat*", "mad", "annoyed", "furious", "irritat*"],
        replies: &[
            "It sounds like you're experiencing some intense emotions. What's been triggering these feelings for you?",
        ],
    },
    Rule {
        category: Category::Overwhelm,
        keywords: &["confused", "lost", "overwhelm*", "exhausted"],
        replies: &[
            "Feeling overwhelmed is completely understandable. Take a deep breath. I'm here to listen.",
        ],
    },
    Rule {
        category: Category::Positive,
        keywords: &["happy", "good", "great", "excited", "grateful", "joy*", "proud", "wonderful"],
        replies: &[
            "It's wonderful to hear that you're feeling positive! What's bringing you joy today?",
        ],
    },
];

const DIARY_DEFAULT: &[&str] = &[
    "I'm here to listen and support you. How are you feeling right now?",
];

fn rules_for(mode: ChatMode) -> (&'static [Rule], &'static [&'static str]) {
    match mode {
        ChatMode::General => (GENERAL_RULES, GENERAL_DEFAULT),
        ChatMode::Diary => (DIARY_RULES, DIARY_DEFAULT),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn keyword_matches(keyword: &str, words: &[String], normalized: &str) -> bool {
    if keyword.contains(' ') {
        return normalized.contains(keyword);
    }
    match keyword.strip_suffix('*') {
        Some(stem) => words.iter().any(|w| w.starts_with(stem)),
        None => words.iter().any(|w| w == keyword),
    }
}

/// Canned replies used when the chat proxy cannot be reached.
pub struct FallbackResponder {
    rng: StdRng,
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackResponder {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn classify(mode: ChatMode, text: &str) -> Category {
        let words = tokenize(text);
        let normalized = words.join(" ");
        let (rules, _) = rules_for(mode);
        rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| keyword_matches(kw, &words, &normalized)))
            .map(|rule| rule.category)
            .unwrap_or(Category::Default)
    }

    pub fn respond(&mut self, mode: ChatMode, text: &str) -> String {
        let category = Self::classify(mode, text);
        let (rules, default_replies) = rules_for(mode);
        let replies = rules
            .iter()
            .find(|rule| rule.category == category)
            .map(|rule| rule.replies)
            .unwrap_or(default_replies);
        replies
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(default_replies[0])
            .to_string()
    }
}
